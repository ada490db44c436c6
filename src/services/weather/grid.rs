//! WGS84 to KMA forecast grid (Lambert conformal conic, 5 km cells).

use std::f64::consts::PI;

use crate::services::location::Coordinates;

const EARTH_RADIUS_KM: f64 = 6371.00877;
const GRID_KM: f64 = 5.0;
const STANDARD_LAT1: f64 = 30.0;
const STANDARD_LAT2: f64 = 60.0;
const ORIGIN_LON: f64 = 126.0;
const ORIGIN_LAT: f64 = 38.0;
const ORIGIN_X: f64 = 43.0;
const ORIGIN_Y: f64 = 136.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridPoint {
    pub nx: i32,
    pub ny: i32,
}

pub fn to_grid(coords: Coordinates) -> GridPoint {
    let deg = PI / 180.0;
    let re = EARTH_RADIUS_KM / GRID_KM;
    let slat1 = STANDARD_LAT1 * deg;
    let slat2 = STANDARD_LAT2 * deg;
    let olon = ORIGIN_LON * deg;
    let olat = ORIGIN_LAT * deg;

    let quarter = |lat: f64| (PI * 0.25 + lat * 0.5).tan();

    let sn = (slat1.cos() / slat2.cos()).ln() / (quarter(slat2) / quarter(slat1)).ln();
    let sf = quarter(slat1).powf(sn) * slat1.cos() / sn;
    let ro = re * sf / quarter(olat).powf(sn);

    let ra = re * sf / quarter(coords.latitude * deg).powf(sn);
    let mut theta = coords.longitude * deg - olon;
    if theta > PI {
        theta -= 2.0 * PI;
    }
    if theta < -PI {
        theta += 2.0 * PI;
    }
    theta *= sn;

    GridPoint {
        nx: (ra * theta.sin() + ORIGIN_X + 0.5).floor() as i32,
        ny: (ro - ra * theta.cos() + ORIGIN_Y + 0.5).floor() as i32,
    }
}
