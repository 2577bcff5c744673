use std::{
    env,
    path::{Path, PathBuf},
    process::ExitCode,
    rc::Rc,
};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use jspy_host::{
    CliOptions, HostAdapter, HostError, Interpreter, RhaiAppLoader, RhaiInterpreter, TeeSink,
    TerminalSink, Value, log::SinkRef, resolver::FALLBACK_ROOT,
};

const USAGE: &[&str] = &[
    r" :\> jspy (fileName.jspy)",
    r" :\> jspy -f (fileName.jspy)",
    r" :\> jspy --file=(fileName.jspy)",
    r" :\> jspy --file=(fileName.jspy) --srcRoot=src",
    r" :\> jspy --file=(fileName.jspy) --param1=someValue1 --param2=someValue2",
    " ",
];

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_tracing();
    install_panic_hook();

    let options = match CliOptions::from_env() {
        Ok(options) => options,
        Err(err) => err.exit(),
    };

    let sink: SinkRef = match &options.output {
        Some(path) => match TeeSink::create(path) {
            Ok(tee) => Rc::new(tee),
            Err(err) => {
                eprintln!("cannot open output file `{}`: {err}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => Rc::new(TerminalSink),
    };

    match run(options, Rc::clone(&sink)).await {
        Ok(code) => code,
        Err(err) => {
            sink.error(&format!("JSPython execution failed: {err}"));
            ExitCode::FAILURE
        }
    }
}

/// Evaluation failures are reported by the adapter itself and only turn into
/// a failing exit code here; other errors are returned for `main` to report.
async fn run(options: CliOptions, sink: SinkRef) -> Result<ExitCode, HostError> {
    let interpreter = RhaiInterpreter::new();
    if options.version {
        sink.info(&interpreter.info());
        sink.info(&version_line());
        return Ok(ExitCode::SUCCESS);
    }
    let Some(file) = options.file.as_deref() else {
        sink.info(&interpreter.info());
        sink.info(&version_line());
        for line in USAGE {
            sink.info(line);
        }
        return Ok(ExitCode::SUCCESS);
    };

    let working_root = env::current_dir()?;
    let script = locate_script(&working_root, &options.src_root, file)?;
    let mut adapter = HostAdapter::new(
        interpreter,
        options.adapter_options(&working_root),
        Rc::clone(&sink),
        RhaiAppLoader::new(Rc::clone(&sink)),
    );

    sink.info(&adapter.info());
    sink.info(&format!("> {file}"));
    let Ok(result) = adapter.evaluate_file(&script, None).await else {
        return Ok(ExitCode::FAILURE);
    };

    let asserts = adapter.asserts();
    if !asserts.is_empty() {
        let passed = asserts.iter().filter(|record| record.success).count();
        sink.info(&format!("  > assert success : {passed}"));
        sink.info(&format!("  > assert failed  : {}", asserts.len() - passed));
    }
    if result.is_truthy() || result == Value::int(0) {
        sink.info(&format!("> {result}"));
    }
    Ok(ExitCode::SUCCESS)
}

fn version_line() -> String {
    format!("jspy cli v{}\n", env!("CARGO_PKG_VERSION"))
}

/// `srcRoot + file`, falling back to `src/<file>`.
fn locate_script(working_root: &Path, src_root: &str, file: &str) -> Result<PathBuf, HostError> {
    let primary = PathBuf::from(format!("{src_root}{file}"));
    let fallback = PathBuf::from(format!("{FALLBACK_ROOT}{file}"));
    if working_root.join(&primary).is_file() {
        Ok(primary)
    } else if working_root.join(&fallback).is_file() {
        Ok(fallback)
    } else {
        Err(HostError::FileNotFound(working_root.join(primary)))
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::try_new("warn").expect("warn filter is valid"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_ansi(false).with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        tracing::error!(%info, "uncaught fault");
        eprintln!("JSPython execution failed: {info}");
    }));
}
