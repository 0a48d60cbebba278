//! Version and build information for urbanform
//!
//! Build metadata (commit SHA, build date, rustc version) is stamped by `build.rs`.

/// Full version string including build metadata
///
/// Returns format: "urbanform {version} ({commit} {date}) rustc {rustc_version}"
pub fn version() -> String {
    format!(
        "urbanform {} ({} {}) rustc {}",
        package_version(),
        build_commit(),
        build_date(),
        rustc_version()
    )
}

/// Package version (e.g., "0.1.0")
pub fn package_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Build commit SHA, or "unknown" outside a git checkout
pub fn build_commit() -> &'static str {
    option_env!("URBANFORM_COMMIT_SHA").unwrap_or("unknown")
}

/// Build date, or "unknown"
pub fn build_date() -> &'static str {
    option_env!("URBANFORM_BUILD_DATE").unwrap_or("unknown")
}

pub fn rustc_version() -> &'static str {
    option_env!("URBANFORM_RUSTC_VERSION").unwrap_or("unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_starts_with_package_name() {
        let v = version();
        assert!(v.starts_with("urbanform "), "unexpected version string: {}", v);
        assert!(v.contains(package_version()));
    }
}
