//! Zman interpreter: evaluates formula ASTs against a date and location.
//!
//! The pieces are the [`ExecutionContext`] a caller builds per request, the
//! tree-walking [`execute`] entry points, [`dependency_order`] for sets of
//! formulas that reference each other, and [`execute_formula_set`] which
//! combines the two.

pub mod batch;
pub mod context;
pub mod deps;
pub mod executor;
pub mod value;

pub use batch::{execute_formula_set, BatchError};
pub use context::ExecutionContext;
pub use deps::{dependency_order, CycleError};
pub use executor::{execute, execute_with_breakdown, season, Breakdown, Evaluation, Executor};
pub use value::{format_minutes, Value};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use chrono::{FixedOffset, NaiveDate, Timelike};
    use indexmap::IndexMap;
    use zman_astro::{minutes_between, Astronomy, Location, NoaaCalculator, SolarAngleTimes, SunTimes, Time};
    use zman_syntax::error::ErrorList;
    use zman_syntax::ErrorKind;

    fn jerusalem() -> Location {
        Location::new(31.7683, 35.2137, 754.0, FixedOffset::east_opt(2 * 3600).unwrap())
    }

    fn ctx_on(y: i32, m: u32, d: u32) -> ExecutionContext {
        ExecutionContext::new(NaiveDate::from_ymd_opt(y, m, d).unwrap(), jerusalem())
    }

    fn run(text: &str, ctx: &mut ExecutionContext) -> Result<Time, ErrorList> {
        let ast = zman_parser::parse(text).unwrap_or_else(|e| panic!("{:?} should parse:\n{}", text, e.render()));
        execute(&ast, ctx)
    }

    fn eval_ok(text: &str, ctx: &mut ExecutionContext) -> Time {
        run(text, ctx).unwrap_or_else(|e| panic!("{:?} should evaluate:\n{}", text, e.render()))
    }

    fn eval_err(text: &str, ctx: &mut ExecutionContext) -> ErrorList {
        match run(text, ctx) {
            Ok(t) => panic!("{:?} should fail, got {}", text, t),
            Err(e) => {
                assert!(e.iter().all(|err| err.kind == ErrorKind::Runtime));
                e
            }
        }
    }

    fn formulas(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_primitives_are_ordered() {
        let mut ctx = ctx_on(2024, 9, 1);
        let names = [
            "astronomical_dawn",
            "nautical_dawn",
            "civil_dawn",
            "sunrise",
            "solar_noon",
            "sunset",
            "civil_dusk",
            "nautical_dusk",
            "astronomical_dusk",
            "solar_midnight",
        ];
        let times: Vec<Time> = names.iter().map(|n| eval_ok(n, &mut ctx)).collect();
        for pair in times.windows(2) {
            assert!(pair[0] < pair[1], "{} !< {}", pair[0], pair[1]);
        }
        assert!(eval_ok("visible_sunrise", &mut ctx) < eval_ok("sunrise", &mut ctx));
    }

    #[test]
    fn test_offsets_are_exact() {
        let mut ctx = ctx_on(2024, 3, 20);
        let rise = eval_ok("sunrise", &mut ctx);
        assert_eq!(minutes_between(eval_ok("sunrise - 72min", &mut ctx), rise), 72.0);
        assert_eq!(minutes_between(rise, eval_ok("sunrise + 1h 30min", &mut ctx)), 90.0);
        assert_eq!(minutes_between(rise, eval_ok("sunrise + 2 * 30min - 15min", &mut ctx)), 45.0);
    }

    #[test]
    fn test_midpoint_and_proportional_hours() {
        let mut ctx = ctx_on(2024, 6, 10);
        let rise = eval_ok("sunrise", &mut ctx);
        let set = eval_ok("sunset", &mut ctx);
        let mid = eval_ok("midpoint(sunrise, sunset)", &mut ctx);
        assert!(rise < mid && mid < set);

        let third = eval_ok("proportional_hours(3, gra)", &mut ctx);
        let by_hand = eval_ok("sunrise + (sunset - sunrise) / 12 * 3", &mut ctx);
        assert!(minutes_between(third, by_hand).abs() < 1.0);
        let fourth = eval_ok("shaos(4, gra)", &mut ctx);
        assert!(fourth > third);

        let mga_start = eval_ok("proportional_hours(0, mga)", &mut ctx);
        assert_eq!(minutes_between(mga_start, rise), 72.0);
        let mga_end = eval_ok("proportional_hours(12, mga_90)", &mut ctx);
        assert!((minutes_between(set, mga_end) - 90.0).abs() < 0.01);

        let custom = eval_ok("proportional_hours(6, custom(sunrise, sunset))", &mut ctx);
        assert!(minutes_between(custom, mid).abs() < 0.01);
    }

    #[test]
    fn test_solar_directions() {
        let mut ctx = ctx_on(2024, 3, 20);
        let rise = eval_ok("sunrise", &mut ctx);
        let set = eval_ok("sunset", &mut ctx);
        let alos = eval_ok("solar(16.1, before_sunrise)", &mut ctx);
        let tzeis = eval_ok("solar(8.5, after_sunset)", &mut ctx);
        assert!(alos < rise);
        assert!(tzeis > set);
        assert_eq!(eval_ok("solar(16.1, before_noon)", &mut ctx), alos);
        assert_eq!(eval_ok("solar(8.5, after_noon)", &mut ctx), tzeis);
        let computed = eval_ok("solar(8 + 0.5, after_sunset)", &mut ctx);
        assert_eq!(computed, tzeis);
    }

    #[test]
    fn test_condition_variables() {
        let mut ctx = ExecutionContext::new(
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            Location::new(40.0, -74.0, 0.0, FixedOffset::west_opt(5 * 3600).unwrap()),
        );
        let rise = eval_ok("sunrise", &mut ctx);
        let set = eval_ok("sunset", &mut ctx);
        assert_eq!(eval_ok("if (latitude > 30) { sunrise } else { sunset }", &mut ctx), rise);
        assert_eq!(eval_ok("if (month == 1) { sunrise } else { sunset }", &mut ctx), rise);
        assert_eq!(eval_ok("if (season() == \"winter\") { sunrise } else { sunset }", &mut ctx), rise);
        assert_eq!(eval_ok("if (day_length > 12h) { sunrise } else { sunset }", &mut ctx), set);
        assert_eq!(eval_ok("if (longitude < 0 && elevation == 0) { sunrise }", &mut ctx), rise);
        assert_eq!(
            eval_ok("if (month == 6 || season != \"winter\") { sunrise } else if (latitude >= 40) { sunset }", &mut ctx),
            set
        );
    }

    #[test]
    fn test_seasons() {
        assert_eq!(season(1, 31.0), "winter");
        assert_eq!(season(4, 31.0), "spring");
        assert_eq!(season(7, 31.0), "summer");
        assert_eq!(season(10, 31.0), "autumn");
        assert_eq!(season(1, -33.9), "summer");
        assert_eq!(season(4, -33.9), "autumn");
        assert_eq!(season(12, -33.9), "summer");
        assert_eq!(season(9, -33.9), "spring");
    }

    #[test]
    fn test_runtime_errors() {
        let mut ctx = ctx_on(2024, 3, 20);
        let errs = eval_err("if (month == 7) { sunrise }", &mut ctx);
        assert!(errs.first().unwrap().msg.contains("no else branch"));

        let errs = eval_err("@alos + 10min", &mut ctx);
        assert!(errs.first().unwrap().msg.contains("undefined reference @alos"));

        eval_err("sunrise + (sunset - sunrise) / 0", &mut ctx);
        let errs = eval_err("sunrise + 10 / 0 * 1min", &mut ctx);
        assert!(errs.first().unwrap().msg.contains("division by zero"));

        let errs = eval_err("sunrise + sunset", &mut ctx);
        assert!(errs.first().unwrap().suggestion.is_some());

        let errs = eval_err("sunset - sunrise", &mut ctx);
        assert!(errs.first().unwrap().msg.contains("not a time"));

        let errs = eval_err("if (season > \"spring\") { sunrise }", &mut ctx);
        assert!(errs.first().unwrap().msg.contains("== or !="));
        eval_err("if (latitude > 10min) { sunrise }", &mut ctx);
        eval_err("if (latitude) { sunrise }", &mut ctx);
        eval_err("solar(16.1)", &mut ctx);
    }

    #[test]
    fn test_errors_accumulate() {
        let mut ctx = ctx_on(2024, 3, 20);
        let errs = eval_err("sunrise + sunset + @missing", &mut ctx);
        assert_eq!(errs.len(), 2);
        let errs = eval_err("midpoint(@a, @b)", &mut ctx);
        assert_eq!(errs.len(), 2);
    }

    #[test]
    fn test_polar_primitives_fail() {
        let tromso = Location::new(69.65, 18.96, 0.0, FixedOffset::east_opt(3600).unwrap());
        let mut ctx = ExecutionContext::new(NaiveDate::from_ymd_opt(2024, 12, 21).unwrap(), tromso);
        let errs = eval_err("sunrise - 72min", &mut ctx);
        assert!(errs.first().unwrap().msg.contains("does not occur"));
        eval_err("proportional_hours(3, gra)", &mut ctx);
        assert!(eval_ok("solar_noon", &mut ctx).hour() >= 11);

        let london = Location::new(51.5074, -0.1278, 0.0, FixedOffset::east_opt(3600).unwrap());
        let mut ctx = ExecutionContext::new(NaiveDate::from_ymd_opt(2024, 6, 21).unwrap(), london);
        eval_err("astronomical_dawn", &mut ctx);
        eval_err("solar(19.75, before_sunrise)", &mut ctx);
    }

    #[test]
    fn test_cache_and_references() {
        let mut ctx = ctx_on(2024, 3, 20);
        let alos = eval_ok("solar(16.1, before_sunrise)", &mut ctx);
        assert_eq!(ctx.memoized("solar(16.1, before_sunrise)"), Some(alos));
        assert!(ctx.cached("solar(16.1, before_sunrise)").is_none());
        assert!(ctx.cached("sunrise").is_none());

        ctx.insert("alos", alos);
        let later = eval_ok("@alos + 10min", &mut ctx);
        assert_eq!(minutes_between(alos, later), 10.0);

        let rise = eval_ok("sunrise", &mut ctx);
        ctx.seed([("custom_start".to_string(), rise)]);
        assert_eq!(eval_ok("@custom_start", &mut ctx), rise);

        ctx.set_date(NaiveDate::from_ymd_opt(2024, 3, 21).unwrap());
        assert!(ctx.cache().is_empty());
        eval_err("@alos", &mut ctx);
    }

    #[test]
    fn test_function_results_follow_reference_changes() {
        let mut ctx = ctx_on(2024, 3, 20);
        let first = execute_formula_set(&formulas(&[("a", "sunrise"), ("m", "midpoint(@a, sunset)")]), &mut ctx).unwrap();
        let second =
            execute_formula_set(&formulas(&[("a", "sunrise - 2h"), ("m", "midpoint(@a, sunset)")]), &mut ctx).unwrap();
        assert_eq!(minutes_between(second["m"], first["m"]), 60.0);

        let rise = eval_ok("sunrise", &mut ctx);
        ctx.insert("a", rise);
        let noon_ish = eval_ok("midpoint(@a, sunset)", &mut ctx);
        assert_eq!(noon_ish, first["m"]);
        ctx.insert("a", rise - chrono::Duration::hours(4));
        assert_eq!(minutes_between(eval_ok("midpoint(@a, sunset)", &mut ctx), noon_ish), 120.0);
    }

    #[test]
    fn test_solar_angles_computed_once_per_day() {
        struct Counting {
            inner: NoaaCalculator,
            calls: AtomicUsize,
        }

        impl Astronomy for Counting {
            fn sun_times(&self, date: NaiveDate, location: &Location) -> SunTimes {
                self.inner.sun_times(date, location)
            }

            fn solar_angle(&self, date: NaiveDate, location: &Location, degrees: f64) -> SolarAngleTimes {
                self.calls.fetch_add(1, Ordering::SeqCst);
                self.inner.solar_angle(date, location, degrees)
            }
        }

        let counting = Arc::new(Counting { inner: NoaaCalculator, calls: AtomicUsize::new(0) });
        let date = NaiveDate::from_ymd_opt(2024, 3, 20).unwrap();
        let mut ctx = ExecutionContext::with_astronomy(date, jerusalem(), counting.clone());

        let dawn = eval_ok("civil_dawn", &mut ctx);
        assert_eq!(eval_ok("civil_dawn", &mut ctx), dawn);
        assert_eq!(eval_ok("solar(6, before_sunrise)", &mut ctx), dawn);
        eval_ok("civil_dusk", &mut ctx);
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);

        eval_ok("nautical_dawn", &mut ctx);
        assert_eq!(counting.calls.load(Ordering::SeqCst), 2);

        ctx.set_date(date.succ_opt().unwrap());
        eval_ok("civil_dusk", &mut ctx);
        assert_eq!(counting.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_out_of_range_offsets_are_runtime_errors() {
        let mut ctx = ctx_on(2024, 3, 20);
        for text in [
            "sunrise + 999999999999min",
            "sunrise - 999999999999min",
            "proportional_hours(100000000 * 100000, gra)",
            "midpoint(sunrise + 999999999999min, sunset)",
        ] {
            let errs = eval_err(text, &mut ctx);
            assert!(errs.iter().any(|e| e.msg.contains("out of range")), "{}: {}", text, errs);
        }
        assert!(eval_ok("sunrise + 1min", &mut ctx) > eval_ok("sunrise", &mut ctx));
    }

    #[test]
    fn test_breakdown_lists_intermediate_steps() {
        let mut ctx = ctx_on(2024, 3, 20);
        let plag = eval_ok("sunset - 1h", &mut ctx);
        ctx.insert("plag", plag);
        let ast = zman_parser::parse("midpoint(sunrise, sunset) + 10min - (@plag - @plag)").unwrap();
        let eval = execute_with_breakdown(&ast, &mut ctx).unwrap();
        let names: Vec<&str> = eval.breakdown.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["sunrise", "sunset", "midpoint(sunrise, sunset)", "@plag"]);
        assert_eq!(eval.breakdown["midpoint(sunrise, sunset)"].as_time().unwrap() + chrono::Duration::minutes(10), eval.result);
    }

    #[test]
    fn test_value_display() {
        assert_eq!(format_minutes(45.0), "45min");
        assert_eq!(format_minutes(72.0), "1h 12min");
        assert_eq!(format_minutes(120.0), "2h");
        assert_eq!(format_minutes(90.0), "1h 30min");
        assert_eq!(format_minutes(-18.0), "-18min");
        assert_eq!(format_minutes(0.0), "0min");
        assert_eq!(Value::Number(16.1).to_string(), "16.1");
        assert_eq!(Value::String("winter".into()).to_string(), "\"winter\"");
        assert_eq!(Value::Boolean(true).to_string(), "true");
    }

    #[test]
    fn test_dependency_order() {
        let set = formulas(&[("tzeis", "@shkia + 18min"), ("shkia", "sunset"), ("plag", "@tzeis - 1h")]);
        assert_eq!(dependency_order(&set).unwrap(), vec!["shkia", "tzeis", "plag"]);

        let independent = formulas(&[("a", "sunrise"), ("b", "sunset"), ("c", "solar_noon")]);
        let order = dependency_order(&independent).unwrap();
        assert_eq!(order.len(), 3);
        assert_eq!(order, vec!["a", "b", "c"]);

        let unknown_and_broken = formulas(&[("a", "@elsewhere + 1min"), ("b", "sunrise +")]);
        assert_eq!(dependency_order(&unknown_and_broken).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_dependency_cycles() {
        let cycle = formulas(&[("a", "@b"), ("b", "@c"), ("c", "@a"), ("d", "sunrise")]);
        let err = dependency_order(&cycle).unwrap_err();
        assert_eq!(err.keys, vec!["a", "b", "c"]);
        assert!(err.to_string().contains("a, b, c"));

        let own = formulas(&[("a", "@a + 1min")]);
        assert_eq!(dependency_order(&own).unwrap_err().keys, vec!["a"]);
    }

    #[test]
    fn test_formula_set_chronology() {
        let mut ctx = ctx_on(2024, 5, 1);
        let set = formulas(&[
            ("tzeis", "@shkia + 72min"),
            ("alos", "@netz - 72min"),
            ("chatzos", "midpoint(@netz, @shkia)"),
            ("netz", "sunrise"),
            ("shkia", "sunset"),
        ]);
        let results = execute_formula_set(&set, &mut ctx).unwrap();
        let keys: Vec<&str> = results.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["tzeis", "alos", "chatzos", "netz", "shkia"]);
        let t = |k: &str| results[k];
        assert!(t("alos") < t("netz"));
        assert!(t("netz") < t("chatzos"));
        assert!(t("chatzos") < t("shkia"));
        assert!(t("shkia") < t("tzeis"));
        assert_eq!(ctx.cached("tzeis"), Some(t("tzeis")));
    }

    #[test]
    fn test_formula_set_failures() {
        let mut ctx = ctx_on(2024, 5, 1);
        let cyclic = formulas(&[("a", "@b"), ("b", "@a")]);
        assert!(matches!(execute_formula_set(&cyclic, &mut ctx), Err(BatchError::Cycle(_))));

        let broken = formulas(&[("ok", "sunrise"), ("bad", "sunrise + sunset")]);
        match execute_formula_set(&broken, &mut ctx) {
            Err(BatchError::Formula { key, errors }) => {
                assert_eq!(key, "bad");
                assert_eq!(errors.first().unwrap().context.as_deref(), Some("sunrise + sunset"));
            }
            other => panic!("Expected formula failure, got {:?}", other),
        }

        let unparsable = formulas(&[("bad", "solar(")]);
        match execute_formula_set(&unparsable, &mut ctx) {
            Err(BatchError::Formula { errors, .. }) => {
                assert_eq!(errors.first().unwrap().kind, ErrorKind::Syntax);
            }
            other => panic!("Expected formula failure, got {:?}", other),
        }
    }
}
