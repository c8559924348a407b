use approx::assert_relative_eq;
use rust_decimal_macros::dec;

use crate::analysis::{Ac, AnalysisParams, AnalysisType, Dc, Sweep, Tran};
use crate::command::{self, Scope};
use crate::config::Config;
use crate::parse::{scaled_f64, Response, Value};

#[test]
fn scales_engineering_suffixes() {
    let cases = [
        ("1n", 1e-9),
        ("2u", 2e-6),
        ("3m", 3e-3),
        ("160n", 1.6e-7),
        ("1k", 1e3),
        ("2.5K", 2.5e3),
        ("1M", 1e6),
        ("4G", 4e9),
        ("1T", 1e12),
        ("10%", 0.1),
        ("8p", 8e-12),
        ("5f", 5e-15),
        ("7a", 7e-18),
        ("1.5e3", 1.5e3),
        ("-2.5u", -2.5e-6),
    ];
    for (token, expected) in cases {
        let value = scaled_f64(token).unwrap_or_else(|| panic!("`{token}` did not parse"));
        assert_relative_eq!(value, expected, max_relative = 1e-12);
    }

    assert_eq!(scaled_f64(""), None);
    assert_eq!(scaled_f64("n"), None);
    assert_eq!(scaled_f64("volts"), None);
    assert_eq!(scaled_f64("1x"), None);
}

#[test]
fn builds_scl_command_strings() {
    assert_eq!(command::list_analyses(), "(sclListAnalysis)");
    assert_eq!(command::run_all(), r#"(sclRun "all")"#);
    assert_eq!(
        command::run_analysis("tran1"),
        r#"(sclRunAnalysis (sclGetAnalysis "tran1"))"#
    );
    assert_eq!(
        command::create_analysis("mytran", AnalysisType::Tran),
        r#"(sclCreateAnalysis "mytran" "tran")"#
    );
    assert_eq!(
        command::get_attribute(Scope::Circuit, "vdd", crate::AttrKind::Value),
        r#"(sclGetAttribute (sclGetParameter (sclGetCircuit "") "vdd") "value")"#
    );
    assert_eq!(
        command::set_attribute(Scope::Circuit, "vdd", crate::AttrKind::Value, &Value::Num(1.5)),
        r#"(sclSetAttribute (sclGetParameter (sclGetCircuit "") "vdd") "value" 1.5)"#
    );
    assert_eq!(
        command::list_attributes(Scope::Analysis("ac1"), "start"),
        r#"(sclListAttribute (sclGetParameter (sclGetAnalysis "ac1") "start"))"#
    );
    assert_eq!(
        command::list_parameters(Scope::Instance("R0")),
        r#"(sclListParameter (sclGetInstance "R0"))"#
    );
}

#[test]
fn renders_scl_literals() {
    assert_eq!(command::literal(&Value::Num(2.5)), "2.5");
    assert_eq!(command::literal(&Value::Str("lin".into())), r#""lin""#);
    assert_eq!(command::literal(&Value::Bool(true)), "t");
    assert_eq!(command::literal(&Value::Bool(false)), "nil");
    assert_eq!(
        command::literal(&Value::List(vec!["a".into(), "b".into()])),
        r#"("a" "b")"#
    );
}

#[test]
fn scrapes_list_responses() {
    let resp = Response::new(
        "(sclListAnalysis)".into(),
        "(\"tran1\" \"tran\")\r\n(\"ac1\" \"ac\")\r\nt\r\n",
    );
    assert!(resp.succeeded());
    assert_eq!(
        resp.name_pairs(),
        vec![
            ("tran1".to_string(), "tran".to_string()),
            ("ac1".to_string(), "ac".to_string()),
        ]
    );

    let resp = Response::new("(sclListNet)".into(), "(\"out\" \"vdd\" \"0\")\nt\n");
    assert_eq!(resp.quoted_names(), vec!["out", "vdd", "0"]);

    let resp = Response::new("(sclListInstance)".into(), "nil\n");
    assert!(!resp.succeeded());
}

#[test]
fn converts_attribute_listings() {
    let resp = Response::new(
        "(sclListAttribute ...)".into(),
        concat!(
            "(\"value\" 10n)\n",
            "(\"min\" 0)\n",
            "(\"max\" 1)\n",
            "(\"units\" \"s\")\n",
            "(\"choices\" (\"liberal\" \"moderate\" \"conservative\"))\n",
            "t\n",
        ),
    );
    let attrs = resp.attributes().unwrap();
    assert_relative_eq!(attrs.value.unwrap().as_f64().unwrap(), 1e-8);
    assert_relative_eq!(attrs.min.unwrap(), 0.0);
    assert_relative_eq!(attrs.max.unwrap(), 1.0);
    assert_eq!(attrs.units.as_deref(), Some("s"));
    assert_eq!(
        attrs.choices.unwrap(),
        vec!["liberal", "moderate", "conservative"]
    );
}

#[test]
fn rejects_unknown_attribute_names() {
    let resp = Response::new(
        "(sclListAttribute ...)".into(),
        "(\"value\" 1)\n(\"wibble\" 2)\nt\n",
    );
    assert!(matches!(
        resp.attributes(),
        Err(crate::Error::Parse { .. })
    ));
}

#[test]
fn rejects_malformed_listing_lines() {
    let resp = Response::new("(sclListAttribute ...)".into(), "garbage here\nt\n");
    assert!(matches!(resp.value_pairs(), Err(crate::Error::Parse { .. })));
}

#[test]
fn config_defaults_fill_missing_keys() {
    let config = Config::from_toml("[spectre]\ntimeout-secs = 7\n").unwrap();
    assert_eq!(config.executable, std::path::PathBuf::from("spectre"));
    assert_eq!(config.args, vec!["-64", "-format", "nutbin"]);
    assert_eq!(config.timeout_secs, 7);

    let config = Config::from_toml("").unwrap();
    assert_eq!(config, Config::default());

    assert!(Config::from_toml("[spectre]\ntimeout-secs = \"soon\"\n").is_err());
}

#[test]
fn analysis_types_roundtrip_names() {
    for kind in [
        AnalysisType::Ac,
        AnalysisType::Dc,
        AnalysisType::Tran,
        AnalysisType::Noise,
        AnalysisType::MonteCarlo,
        AnalysisType::Hbnoise,
    ] {
        assert_eq!(AnalysisType::from_name(kind.name()), Some(kind));
    }
    assert_eq!(AnalysisType::from_name("fft"), None);
}

#[test]
fn analysis_bundles_expand_to_parameters() {
    let tran = Tran {
        stop: dec!(10),
        start: None,
        errpreset: Some(crate::ErrPreset::Conservative),
    };
    assert_eq!(
        tran.params(),
        vec![("stop", "10".to_string()), ("errpreset", "conservative".to_string())]
    );

    let ac = Ac {
        start: dec!(1),
        stop: dec!(1000000),
        sweep: Sweep::Decade(10),
    };
    assert_eq!(
        ac.params(),
        vec![
            ("start", "1".to_string()),
            ("stop", "1000000".to_string()),
            ("dec", "10".to_string()),
        ]
    );

    let dc = Dc {
        param: "vdd".to_string(),
        start: dec!(0),
        stop: dec!(2),
        step: dec!(0.1),
    };
    assert_eq!(dc.params().len(), 4);
}

#[cfg(unix)]
mod repl {
    use std::fs;
    use std::path::{Path, PathBuf};

    use approx::assert_relative_eq;
    use tempfile::TempDir;

    use crate::analysis::AnalysisType;
    use crate::error::{EntityKind, Error};
    use crate::parse::Value;
    use crate::session::Session;
    use crate::{AttrKind, Options};

    /// A `/bin/sh` stand-in for the simulator that speaks the `> ` prompt
    /// protocol, answers the SCL commands the tests dispatch, and appends a
    /// plot to the rawfile on every run command.
    const REPL_SCRIPT: &str = r##"#!/bin/sh
raw=
interactive=
prev=
for a in "$@"; do
  case "$a" in
    +interactive) interactive=1 ;;
  esac
  case "$prev" in
    -raw) raw=$a ;;
  esac
  prev=$a
done

vdd=0.0
errpreset='"moderate"'
created=
run=0

emit_plot() {
  {
    printf 'Plotname: %s\n' "$1"
    printf 'Flags: real\n'
    printf 'No. Variables: 2\n'
    printf 'No. Points: 2\n'
    printf 'Variables:\n'
    printf '\t0\ttime\ttime\n'
    printf '\t1\tv(out)\tvoltage\n'
    printf 'Values:\n'
    printf '0\t0.0\n\t%s\n' "$vdd"
    printf '1\t1e-9\n\t%s\n' "$vdd"
  } >> "$raw"
}

if [ -z "$interactive" ]; then
  emit_plot tran1
  exit 0
fi

printf 'spectre (64bit) command-channel stand-in\n'
printf '\n> '

while IFS= read -r line; do
  case "$line" in
    '(sclQuit)')
      exit 0
      ;;
    '(sclListAnalysis)')
      printf '("tran1" "tran")\n("ac1" "ac")\n'
      if [ -n "$created" ]; then printf '("noise1" "noise")\n'; fi
      printf 't\n'
      ;;
    '(sclListInstance)')
      printf '("R0" "resistor")\n("C0" "capacitor")\nt\n'
      ;;
    '(sclListNet)')
      printf '("out" "vdd" "0")\nt\n'
      ;;
    '(sclCreateAnalysis "noise1" "noise")')
      created=1
      printf 't\n'
      ;;
    '(sclCreateAnalysis '*)
      printf 't\n'
      ;;
    '(sclListParameter (sclGetAnalysis "tran1"))')
      printf '("stop" 10n)\n("start" 0)\n("errpreset" %s)\nt\n' "$errpreset"
      ;;
    '(sclListParameter (sclGetInstance "R0"))')
      printf '("r" 1K)\n("w" 2u)\nt\n'
      ;;
    '(sclListParameter (sclGetInstance '*)
      printf 'nil\n'
      ;;
    '(sclListAttribute (sclGetParameter (sclGetAnalysis "tran1") "stop"))')
      printf '("value" 10n)\n("min" 0)\n("max" 1)\n("units" "s")\nt\n'
      ;;
    '(sclListAttribute (sclGetParameter (sclGetAnalysis "tran1") "errpreset"))')
      printf '("value" %s)\n("choices" ("liberal" "moderate" "conservative"))\nt\n' "$errpreset"
      ;;
    '(sclListAttribute (sclGetParameter (sclGetInstance '*)
      printf 'nil\n'
      ;;
    '(sclGetAttribute (sclGetParameter (sclGetCircuit "") "vdd") "value")')
      printf '%s\n' "$vdd"
      ;;
    '(sclGetAttribute '*)
      printf 'nil\n'
      ;;
    '(sclSetAttribute (sclGetParameter (sclGetCircuit "") "vdd") "value" '*)
      vdd=$(printf '%s' "$line" | sed 's/.*"value" //; s/)$//')
      printf 't\n'
      ;;
    '(sclSetAttribute (sclGetParameter (sclGetAnalysis "tran1") "errpreset") "value" '*)
      errpreset=$(printf '%s' "$line" | sed 's/.*"value" //; s/)$//')
      printf 't\n'
      ;;
    '(sclSetAttribute '*)
      printf 't\n'
      ;;
    '(sclRun "all")')
      run=$((run+1))
      emit_plot "tran$run"
      printf 't\n'
      ;;
    '(sclRunAnalysis (sclGetAnalysis "tran1"))')
      emit_plot tran1
      printf 't\n'
      ;;
    '(sclRunAnalysis (sclGetAnalysis "ac1"))')
      printf 't\n'
      ;;
    '(sclRunAnalysis '*)
      printf 'nil\n'
      ;;
    '(sleepy)')
      sleep 30
      printf 't\n'
      ;;
    *)
      printf 'nil\n'
      ;;
  esac
  printf '\n> '
done
"##;

    fn make_executable(path: &Path) {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms).unwrap();
    }

    struct Harness {
        dir: TempDir,
        netlist: PathBuf,
        script: PathBuf,
    }

    impl Harness {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let netlist = dir.path().join("netlist.scs");
            fs::write(&netlist, "// test netlist\nsimulator lang=spectre\n").unwrap();
            let script = dir.path().join("spectre-repl.sh");
            fs::write(&script, REPL_SCRIPT).unwrap();
            make_executable(&script);
            fs::write(
                dir.path().join("spectre.toml"),
                format!(
                    "[spectre]\nexecutable = \"{}\"\nargs = []\ntimeout-secs = 10\n",
                    script.display()
                ),
            )
            .unwrap();
            Self {
                dir,
                netlist,
                script,
            }
        }

        /// Configuration is discovered from `spectre.toml` next to the
        /// netlist.
        fn session(&self) -> Session {
            Session::start(&self.netlist, Options::default()).unwrap()
        }

        fn short_timeout_options(&self) -> Options {
            let path = self.dir.path().join("short.toml");
            fs::write(
                &path,
                format!(
                    "[spectre]\nexecutable = \"{}\"\nargs = []\ntimeout-secs = 1\n",
                    self.script.display()
                ),
            )
            .unwrap();
            let mut options = Options::default();
            options.config_file(path);
            options
        }
    }

    #[test]
    fn lists_netlist_entities() {
        let harness = Harness::new();
        let mut session = harness.session();

        assert_eq!(
            session.list_analyses().unwrap(),
            vec![
                ("tran1".to_string(), "tran".to_string()),
                ("ac1".to_string(), "ac".to_string()),
            ]
        );
        assert_eq!(
            session.list_instances().unwrap(),
            vec![
                ("R0".to_string(), "resistor".to_string()),
                ("C0".to_string(), "capacitor".to_string()),
            ]
        );
        assert_eq!(session.list_nets().unwrap(), vec!["out", "vdd", "0"]);
        assert_eq!(
            session.list_analysis_parameters("tran1").unwrap(),
            vec!["stop", "start", "errpreset"]
        );
        session.stop().unwrap();
    }

    #[test]
    fn numeric_parameter_roundtrips() {
        let harness = Harness::new();
        let mut session = harness.session();

        session.set_parameter("vdd", 0.9).unwrap();
        assert_relative_eq!(session.get_parameter("vdd").unwrap(), 0.9);

        session.set_parameters([("vdd", 0.45)]).unwrap();
        let values = session.get_parameters(["vdd"]).unwrap();
        assert_relative_eq!(values["vdd"], 0.45);
    }

    #[test]
    fn enumerated_parameter_roundtrips() {
        let harness = Harness::new();
        let mut session = harness.session();

        let attrs = session.get_analysis_parameter("tran1", "errpreset").unwrap();
        assert_eq!(attrs.value, Some(Value::Str("moderate".to_string())));
        assert_eq!(
            attrs.choices.unwrap(),
            vec!["liberal", "moderate", "conservative"]
        );

        session
            .set_analysis_parameter("tran1", "errpreset", AttrKind::Value, "conservative")
            .unwrap();
        let attrs = session.get_analysis_parameter("tran1", "errpreset").unwrap();
        assert_eq!(attrs.value, Some(Value::Str("conservative".to_string())));
    }

    #[test]
    fn attribute_values_are_suffix_scaled() {
        let harness = Harness::new();
        let mut session = harness.session();

        let attrs = session.get_analysis_parameter("tran1", "stop").unwrap();
        assert_relative_eq!(attrs.value.unwrap().as_f64().unwrap(), 1e-8);
        assert_relative_eq!(attrs.min.unwrap(), 0.0);
        assert_relative_eq!(attrs.max.unwrap(), 1.0);
        assert_eq!(attrs.units.as_deref(), Some("s"));

        let params = session.list_instance_parameters("R0").unwrap();
        assert_eq!(params[0].0, "r");
        assert_relative_eq!(params[0].1.as_f64().unwrap(), 1e3);
        assert_relative_eq!(params[1].1.as_f64().unwrap(), 2e-6);
    }

    #[test]
    fn created_analysis_is_listed_once() {
        let harness = Harness::new();
        let mut session = harness.session();

        session.create_analysis("noise1", AnalysisType::Noise).unwrap();
        let analyses = session.list_analyses().unwrap();
        let count = analyses.iter().filter(|(name, _)| name == "noise1").count();
        assert_eq!(count, 1);
    }

    #[test]
    fn unknown_instance_is_flagged() {
        let harness = Harness::new();
        let mut session = harness.session();

        let before = session.list_instances().unwrap();
        let err = session.get_instance_parameter("xnope", "w").unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownEntity {
                kind: EntityKind::Instance,
                ref name,
            } if name.as_str() == "xnope"
        ));
        // The failed lookup leaves the session as it was.
        assert_eq!(session.list_instances().unwrap(), before);
    }

    #[test]
    fn run_all_reads_results_incrementally() {
        let harness = Harness::new();
        let mut session = harness.session();

        session.set_parameter("vdd", 0.75).unwrap();
        let results = session.run_all().unwrap();
        assert_eq!(results.len(), 1);
        let vout = results.plot("tran1").unwrap().real("v(out)").unwrap();
        assert_relative_eq!(vout[0], 0.75);
        assert_relative_eq!(vout[1], 0.75);

        // The second run decodes only the newly appended plot.
        session.set_parameter("vdd", 0.25).unwrap();
        let results = session.run_all().unwrap();
        assert_eq!(results.len(), 1);
        assert!(results.plot("tran1").is_none());
        let vout = results.plot("tran2").unwrap().real("v(out)").unwrap();
        assert_relative_eq!(vout[0], 0.25);

        // A targeted run reloads the whole file.
        let results = session.run_analysis("tran1").unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn unknown_analysis_cannot_run() {
        let harness = Harness::new();
        let mut session = harness.session();

        let err = session.run_analysis("nope").unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownEntity {
                kind: EntityKind::Analysis,
                ..
            }
        ));
    }

    #[test]
    fn run_without_output_reports_missing_results() {
        let harness = Harness::new();
        let mut session = harness.session();

        let err = session.run_analysis("ac1").unwrap_err();
        assert!(matches!(err, Error::ResultNotFound(_)));
    }

    #[test]
    fn batch_session_rejects_dispatch() {
        let harness = Harness::new();
        let mut options = Options::default();
        options.batch();
        let mut session = Session::start(&harness.netlist, options).unwrap();

        assert!(matches!(
            session.list_analyses(),
            Err(Error::NotInteractive)
        ));
        assert!(matches!(
            session.run_analysis("tran1"),
            Err(Error::NotInteractive)
        ));
    }

    #[test]
    fn batch_run_loads_results() {
        let harness = Harness::new();
        let results = crate::simulate(&harness.netlist, Options::default()).unwrap();
        assert!(results.plot("tran1").is_some());
    }

    #[test]
    fn netlist_text_simulates_from_temporary_file() {
        let harness = Harness::new();
        let mut options = Options::default();
        options.config_file(harness.dir.path().join("spectre.toml"));
        let results = crate::simulate_netlist("// inline netlist\n", options).unwrap();
        assert!(results.plot("tran1").is_some());
    }

    #[test]
    fn missing_binary_fails_launch() {
        let dir = TempDir::new().unwrap();
        let netlist = dir.path().join("netlist.scs");
        fs::write(&netlist, "// test netlist\n").unwrap();
        fs::write(
            dir.path().join("spectre.toml"),
            "[spectre]\nexecutable = \"/nonexistent/spectre-simulator\"\nargs = []\ntimeout-secs = 2\n",
        )
        .unwrap();

        let err = Session::start(&netlist, Options::default()).unwrap_err();
        assert!(matches!(err, Error::Launch { .. }));
    }

    #[test]
    fn missing_netlist_fails_launch() {
        let harness = Harness::new();
        let err = Session::start(harness.dir.path().join("absent.scs"), Options::default())
            .unwrap_err();
        assert!(matches!(err, Error::Launch { .. }));
    }

    #[test]
    fn slow_response_times_out() {
        let harness = Harness::new();
        let mut session =
            Session::start(&harness.netlist, harness.short_timeout_options()).unwrap();

        let err = session.raw_command("(sleepy)").unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
        // The session is still stoppable after a timeout.
        session.stop().unwrap();
    }

    #[test]
    fn unbalanced_raw_command_is_rejected() {
        let harness = Harness::new();
        let mut session = harness.session();

        let err = session.raw_command(r#"(sclRun "all""#).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
        // Nothing was sent; the channel still answers.
        assert!(session.raw_command("(sclListAnalysis)").unwrap());
    }

    #[test]
    fn stop_is_idempotent() {
        let harness = Harness::new();
        let mut session = harness.session();

        assert!(session.is_running());
        session.stop().unwrap();
        assert!(!session.is_running());
        session.stop().unwrap();
        assert!(matches!(
            session.list_analyses(),
            Err(Error::NotInteractive)
        ));
    }
}
