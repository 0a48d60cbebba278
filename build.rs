use std::process::Command;

/// Trimmed stdout of a successful command, if any
fn stdout_of(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn main() {
    let stamps = [
        ("URBANFORM_COMMIT_SHA", stdout_of("git", &["rev-parse", "--short", "HEAD"])),
        ("URBANFORM_BUILD_DATE", stdout_of("date", &["+%Y-%m-%d"])),
        (
            "URBANFORM_RUSTC_VERSION",
            // "rustc 1.92.0 (ded5c06cf 2025-12-08)" -> "1.92.0"
            stdout_of("rustc", &["--version"]).and_then(|v| {
                v.strip_prefix("rustc ")
                    .and_then(|rest| rest.split_whitespace().next())
                    .map(str::to_string)
            }),
        ),
    ];

    for (name, value) in stamps {
        println!(
            "cargo:rustc-env={}={}",
            name,
            value.as_deref().unwrap_or("unknown")
        );
    }

    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=build.rs");
}
