//! Sun position after the NOAA solar calculator equations.

use chrono::{Duration, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::{minutes_between, Astronomy, Location, SolarAngleTimes, SunTimes, Time};

/// Zenith of the sun's upper limb at rise/set, including standard refraction.
const SUNRISE_ZENITH: f64 = 90.833;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Julian day of 0001-01-01 00:00 UT minus one, so that adding
/// `num_days_from_ce` gives the Julian day at midnight.
const JD_CE_OFFSET: f64 = 1_721_424.5;

const JD_J2000: f64 = 2_451_545.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct NoaaCalculator;

#[derive(Debug, Clone, Copy)]
struct SolarPosition {
    /// Degrees.
    declination: f64,
    /// Minutes.
    equation_of_time: f64,
}

/// Where the sun stands relative to a zenith angle over a whole day.
enum Crossing {
    At(f64),
    AlwaysAbove,
    AlwaysBelow,
}

fn julian_day(date: NaiveDate) -> f64 {
    use chrono::Datelike;
    date.num_days_from_ce() as f64 + JD_CE_OFFSET
}

fn solar_position(jd: f64) -> SolarPosition {
    let t = (jd - JD_J2000) / 36_525.0;

    let mean_long = (280.46646 + t * (36_000.76983 + t * 0.0003032)).rem_euclid(360.0);
    let mean_anom = 357.52911 + t * (35_999.05029 - 0.0001537 * t);
    let eccent = 0.016708634 - t * (0.000042037 + 0.0000001267 * t);

    let m = mean_anom.to_radians();
    let center = m.sin() * (1.914602 - t * (0.004817 + 0.000014 * t))
        + (2.0 * m).sin() * (0.019993 - 0.000101 * t)
        + (3.0 * m).sin() * 0.000289;
    let true_long = mean_long + center;
    let omega = (125.04 - 1934.136 * t).to_radians();
    let apparent_long = true_long - 0.00569 - 0.00478 * omega.sin();

    let mean_obliq = 23.0 + (26.0 + (21.448 - t * (46.815 + t * (0.00059 - t * 0.001813))) / 60.0) / 60.0;
    let obliq = (mean_obliq + 0.00256 * omega.cos()).to_radians();

    let declination = (obliq.sin() * apparent_long.to_radians().sin()).asin().to_degrees();

    let y = (obliq / 2.0).tan().powi(2);
    let l0 = mean_long.to_radians();
    let eot = y * (2.0 * l0).sin() - 2.0 * eccent * m.sin() + 4.0 * eccent * y * m.sin() * (2.0 * l0).cos()
        - 0.5 * y * y * (4.0 * l0).sin()
        - 1.25 * eccent * eccent * (2.0 * m).sin();

    SolarPosition {
        declination,
        equation_of_time: 4.0 * eot.to_degrees(),
    }
}

fn hour_angle(latitude: f64, declination: f64, zenith: f64) -> Crossing {
    let (lat, dec) = (latitude.to_radians(), declination.to_radians());
    let cos_ha = zenith.to_radians().cos() / (lat.cos() * dec.cos()) - lat.tan() * dec.tan();
    if cos_ha > 1.0 {
        Crossing::AlwaysBelow
    } else if cos_ha < -1.0 {
        Crossing::AlwaysAbove
    } else {
        Crossing::At(cos_ha.acos().to_degrees())
    }
}

/// Solar noon in minutes after UTC midnight of the date.
fn noon_minutes(jd0: f64, longitude: f64) -> f64 {
    let rough = 720.0 - 4.0 * longitude;
    let pos = solar_position(jd0 + rough / 1440.0);
    720.0 - 4.0 * longitude - pos.equation_of_time
}

/// Horizon dip seen from `elevation` meters.
fn horizon_dip(elevation: f64) -> f64 {
    if elevation <= 0.0 {
        return 0.0;
    }
    (EARTH_RADIUS_M / (EARTH_RADIUS_M + elevation)).acos().to_degrees()
}

fn to_time(date: NaiveDate, minutes: f64, location: &Location) -> Time {
    let midnight = Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN));
    // crossings lie within a day of UTC midnight
    let offset = Duration::milliseconds((minutes * 60_000.0).round() as i64);
    (midnight + offset).with_timezone(&location.timezone)
}

impl NoaaCalculator {
    /// Minutes after UTC midnight at which the sun crosses `zenith`, on the
    /// rising or setting side. One refinement pass recomputes the sun's
    /// position at the first estimate.
    fn crossing(&self, date: NaiveDate, location: &Location, zenith: f64, rising: bool) -> Crossing {
        let jd0 = julian_day(date);
        let mut minutes = noon_minutes(jd0, location.longitude);
        for _ in 0..2 {
            let pos = solar_position(jd0 + minutes / 1440.0);
            let ha = match hour_angle(location.latitude, pos.declination, zenith) {
                Crossing::At(ha) => ha,
                other => return other,
            };
            let noon = 720.0 - 4.0 * location.longitude - pos.equation_of_time;
            minutes = if rising { noon - 4.0 * ha } else { noon + 4.0 * ha };
        }
        Crossing::At(minutes)
    }

    fn crossing_time(&self, date: NaiveDate, location: &Location, zenith: f64, rising: bool) -> Option<Time> {
        match self.crossing(date, location, zenith, rising) {
            Crossing::At(m) => Some(to_time(date, m, location)),
            Crossing::AlwaysAbove | Crossing::AlwaysBelow => None,
        }
    }
}

impl Astronomy for NoaaCalculator {
    fn sun_times(&self, date: NaiveDate, location: &Location) -> SunTimes {
        let jd0 = julian_day(date);
        let solar_noon = to_time(date, noon_minutes(jd0, location.longitude), location);

        let rising = self.crossing(date, location, SUNRISE_ZENITH, true);
        let setting = self.crossing(date, location, SUNRISE_ZENITH, false);
        let (sunrise, sunset, day_length) = match (rising, setting) {
            (Crossing::At(r), Crossing::At(s)) => {
                let (rise, set) = (to_time(date, r, location), to_time(date, s, location));
                (Some(rise), Some(set), minutes_between(rise, set))
            }
            (Crossing::AlwaysAbove, _) | (_, Crossing::AlwaysAbove) => (None, None, 1440.0),
            _ => (None, None, 0.0),
        };

        let visible_zenith = SUNRISE_ZENITH + horizon_dip(location.elevation);
        let visible_sunrise = self.crossing_time(date, location, visible_zenith, true);
        let visible_sunset = self.crossing_time(date, location, visible_zenith, false);

        tracing::debug!(
            %date,
            latitude = location.latitude,
            longitude = location.longitude,
            day_length,
            "computed sun times"
        );

        SunTimes {
            sunrise,
            sunset,
            visible_sunrise,
            visible_sunset,
            solar_noon,
            solar_midnight: solar_noon + Duration::hours(12),
            day_length,
        }
    }

    fn solar_angle(&self, date: NaiveDate, location: &Location, degrees: f64) -> SolarAngleTimes {
        let zenith = 90.0 + degrees;
        let times = SolarAngleTimes {
            ascending: self.crossing_time(date, location, zenith, true),
            descending: self.crossing_time(date, location, zenith, false),
        };
        tracing::trace!(%date, degrees, ?times, "computed solar angle");
        times
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn julian_day_epoch() {
        let d = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        assert_eq!(julian_day(d), 2_451_544.5);
    }

    #[test]
    fn declination_tracks_the_seasons() {
        let jd = |y, m, d| julian_day(NaiveDate::from_ymd_opt(y, m, d).unwrap()) + 0.5;
        assert!((solar_position(jd(2024, 6, 21)).declination - 23.44).abs() < 0.1);
        assert!((solar_position(jd(2024, 12, 21)).declination + 23.44).abs() < 0.1);
        assert!(solar_position(jd(2024, 3, 20)).declination.abs() < 0.5);
    }

    #[test]
    fn horizon_dip_grows_with_elevation() {
        assert_eq!(horizon_dip(0.0), 0.0);
        assert_eq!(horizon_dip(-20.0), 0.0);
        let dip = horizon_dip(800.0);
        assert!(dip > 0.8 && dip < 1.0, "{}", dip);
    }
}
