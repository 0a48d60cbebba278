//! Projection and convex-hull area
//!
//! [`GeometryOps`] is the seam between metric computation and geodesy.
//! [`UtmGeometry`] projects lon/lat graphs into the UTM zone of their mean
//! longitude (WGS84, metres); [`PlanarGeometry`] takes coordinates as they are.

use geo::{Area, ConvexHull, Coord, MultiPoint};

use crate::graph::StreetGraph;

/// Mean Earth radius in metres, used for haversine lengths
pub const EARTH_RADIUS_M: f64 = 6_371_009.0;

/// Geometric operations needed to normalise street metrics
pub trait GeometryOps {
    /// Return the graph in a planar frame suitable for length/area measurement
    fn project(&self, graph: &StreetGraph) -> StreetGraph;

    /// Area of the convex hull of `points`, in squared projected units
    fn hull_area(&self, points: &[Coord<f64>]) -> f64 {
        convex_hull_area(points)
    }
}

/// Convex hull area over the finite points; fewer than 3 enclose nothing
pub fn convex_hull_area(points: &[Coord<f64>]) -> f64 {
    let finite: Vec<Coord<f64>> = points
        .iter()
        .copied()
        .filter(|c| c.x.is_finite() && c.y.is_finite())
        .collect();
    if finite.len() < 3 {
        return 0.0;
    }
    MultiPoint::from(finite).convex_hull().unsigned_area()
}

/// Great-circle distance in metres between two lon/lat points
pub fn haversine_m(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let h = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Coordinates are already planar
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanarGeometry;

impl GeometryOps for PlanarGeometry {
    fn project(&self, graph: &StreetGraph) -> StreetGraph {
        graph.clone()
    }
}

/// Universal Transverse Mercator projection on the WGS84 ellipsoid
#[derive(Debug, Clone, Copy, Default)]
pub struct UtmGeometry;

const WGS84_A: f64 = 6_378_137.0;
const WGS84_F: f64 = 1.0 / 298.257_223_563;
const UTM_K0: f64 = 0.9996;
const UTM_FALSE_EASTING: f64 = 500_000.0;
const UTM_FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// A UTM zone, e.g. 31N
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtmZone {
    pub number: u8,
    pub north: bool,
}

impl UtmZone {
    /// Zone containing the given lon/lat
    pub fn containing(lon: f64, lat: f64) -> Self {
        let number = (((lon + 180.0) / 6.0).floor() as i64).rem_euclid(60) as u8 + 1;
        Self {
            number,
            north: lat >= 0.0,
        }
    }

    pub fn central_meridian(&self) -> f64 {
        f64::from(self.number - 1) * 6.0 - 180.0 + 3.0
    }

    /// Proj-style CRS label stored on projected graphs
    pub fn proj_string(&self) -> String {
        format!(
            "+proj=utm +zone={}{} +ellps=WGS84 +datum=WGS84 +units=m +no_defs",
            self.number,
            if self.north { "" } else { " +south" }
        )
    }

    /// Forward transverse Mercator (Snyder, USGS PP 1395, eq. 8-9 to 8-10)
    pub fn project(&self, lon: f64, lat: f64) -> (f64, f64) {
        let e2 = WGS84_F * (2.0 - WGS84_F);
        let e4 = e2 * e2;
        let e6 = e4 * e2;
        let ep2 = e2 / (1.0 - e2);

        let phi = lat.to_radians();
        let (sin_phi, cos_phi) = phi.sin_cos();
        let tan_phi = phi.tan();

        let n = WGS84_A / (1.0 - e2 * sin_phi * sin_phi).sqrt();
        let t = tan_phi * tan_phi;
        let c = ep2 * cos_phi * cos_phi;
        let a = cos_phi * (lon - self.central_meridian()).to_radians();

        let m = WGS84_A
            * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
                - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
                + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
                - (35.0 * e6 / 3072.0) * (6.0 * phi).sin());

        let x = UTM_K0
            * n
            * (a + (1.0 - t + c) * a.powi(3) / 6.0
                + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a.powi(5) / 120.0)
            + UTM_FALSE_EASTING;

        let mut y = UTM_K0
            * (m + n
                * tan_phi
                * (a * a / 2.0
                    + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a.powi(6) / 720.0));
        if !self.north {
            y += UTM_FALSE_NORTHING_SOUTH;
        }

        (x, y)
    }
}

impl UtmGeometry {
    /// Zone chosen for a graph: the one containing its mean node position
    pub fn zone_for(graph: &StreetGraph) -> UtmZone {
        let count = graph.node_count().max(1) as f64;
        let (sum_x, sum_y) = graph
            .nodes()
            .fold((0.0, 0.0), |(sx, sy), n| (sx + n.x, sy + n.y));
        UtmZone::containing(sum_x / count, sum_y / count)
    }
}

impl GeometryOps for UtmGeometry {
    fn project(&self, graph: &StreetGraph) -> StreetGraph {
        if graph.is_projected() {
            return graph.clone();
        }
        let zone = Self::zone_for(graph);
        graph.map_positions(zone.proj_string(), |lon, lat| zone.project(lon, lat))
    }
}
