use std::{
    cell::RefCell,
    env, fs,
    io::{self, Read, Write},
    net::IpAddr,
    path::{self, Path, PathBuf},
    process::Command,
    rc::Rc,
    thread,
    time::Duration,
};

use base64::{Engine, engine::general_purpose::STANDARD};
use flate2::{
    Compression,
    read::{GzDecoder, ZlibDecoder},
    write::{GzEncoder, ZlibEncoder},
};
use indexmap::IndexMap;

use crate::{
    error::{HostError, Result},
    http,
    log::SinkRef,
    value::{ModuleValue, VARIADIC, Value, ValueKind},
};

/// Builds a fresh module instance. Providers that write to the terminal do so
/// through the given sink.
pub type Provider = fn(&SinkRef) -> ModuleValue;

/// Allow-listed system packages, each backed by a statically linked provider.
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    providers: IndexMap<String, Provider>,
}

impl CapabilityRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register("fs", fs_module);
        registry.register("path", path_module);
        registry.register("os", os_module);
        registry.register("child_process", child_process_module);
        registry.register("timers", timers_module);
        registry.register("util", util_module);
        registry.register("readline", readline_module);
        registry.register("buffer", buffer_module);
        registry.register("zlib", zlib_module);
        registry.register("events", events_module);
        registry.register("net", net_module);
        registry.register("http", http::module);
        registry.register("https", http::module);
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, provider: Provider) {
        self.providers.insert(name.into(), provider);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    pub fn load(&self, name: &str, sink: &SinkRef) -> Option<ModuleValue> {
        self.providers.get(name).map(|provider| provider(sink))
    }
}

fn module(name: &str, entries: Vec<(&str, Value)>) -> ModuleValue {
    ModuleValue {
        name: name.to_string(),
        exports: entries
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect(),
    }
}

fn native(name: &str, arity: usize, callback: fn(&[Value]) -> Result<Value>) -> Value {
    Value::native(name, arity, callback)
}

fn ensure_min(args: &[Value], min: usize, name: &str) -> Result<()> {
    if args.len() < min {
        return Err(HostError::runtime(format!(
            "`{name}` expected at least {min} arguments but received {}",
            args.len()
        )));
    }
    Ok(())
}

fn expect_string(value: &Value, name: &str) -> Result<String> {
    value.as_str().map(str::to_string).ok_or_else(|| {
        HostError::runtime(format!(
            "`{name}` expected String but found {}",
            value.type_name()
        ))
    })
}

fn expect_number(value: &Value, name: &str) -> Result<f64> {
    value.as_f64().ok_or_else(|| {
        HostError::runtime(format!(
            "`{name}` expected numeric but found {}",
            value.type_name()
        ))
    })
}

fn expect_function(value: &Value, name: &str) -> Result<()> {
    match value.as_function() {
        Some(_) => Ok(()),
        None => Err(HostError::runtime(format!(
            "`{name}` expected Function but found {}",
            value.type_name()
        ))),
    }
}

fn path_value(path: &Path) -> Value {
    Value::string(path.to_string_lossy().into_owned())
}

fn fs_module(_: &SinkRef) -> ModuleValue {
    module(
        "fs",
        vec![
            ("readFile", native("readFile", VARIADIC, fs_read_file)),
            ("writeFile", native("writeFile", 2, fs_write_file)),
            ("appendFile", native("appendFile", 2, fs_append_file)),
            ("existsSync", native("existsSync", 1, fs_exists)),
            ("readdir", native("readdir", 1, fs_readdir)),
            ("mkdir", native("mkdir", 1, fs_mkdir)),
            ("unlink", native("unlink", 1, fs_unlink)),
        ],
    )
}

fn fs_read_file(args: &[Value]) -> Result<Value> {
    ensure_min(args, 1, "fs.readFile")?;
    let path = expect_string(&args[0], "fs.readFile")?;
    Ok(Value::string(fs::read_to_string(path)?))
}

fn fs_write_file(args: &[Value]) -> Result<Value> {
    let path = expect_string(&args[0], "fs.writeFile")?;
    fs::write(path, args[1].to_string())?;
    Ok(Value::null())
}

fn fs_append_file(args: &[Value]) -> Result<Value> {
    let path = expect_string(&args[0], "fs.appendFile")?;
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    write!(file, "{}", args[1])?;
    Ok(Value::null())
}

fn fs_exists(args: &[Value]) -> Result<Value> {
    let path = expect_string(&args[0], "fs.existsSync")?;
    Ok(Value::bool(Path::new(&path).exists()))
}

fn fs_readdir(args: &[Value]) -> Result<Value> {
    let path = expect_string(&args[0], "fs.readdir")?;
    let mut names = Vec::new();
    for entry in fs::read_dir(path)? {
        names.push(entry?.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(Value::array(names.into_iter().map(Value::string).collect()))
}

fn fs_mkdir(args: &[Value]) -> Result<Value> {
    let path = expect_string(&args[0], "fs.mkdir")?;
    fs::create_dir_all(path)?;
    Ok(Value::null())
}

fn fs_unlink(args: &[Value]) -> Result<Value> {
    let path = expect_string(&args[0], "fs.unlink")?;
    fs::remove_file(path)?;
    Ok(Value::null())
}

fn path_module(_: &SinkRef) -> ModuleValue {
    module(
        "path",
        vec![
            ("join", native("join", VARIADIC, path_join)),
            ("basename", native("basename", 1, path_basename)),
            ("dirname", native("dirname", 1, path_dirname)),
            ("extname", native("extname", 1, path_extname)),
            ("resolve", native("resolve", VARIADIC, path_resolve)),
            ("sep", Value::string(path::MAIN_SEPARATOR_STR)),
        ],
    )
}

fn joined(args: &[Value], name: &str) -> Result<PathBuf> {
    let mut path = PathBuf::new();
    for arg in args {
        path.push(expect_string(arg, name)?);
    }
    Ok(path)
}

fn path_join(args: &[Value]) -> Result<Value> {
    Ok(path_value(&joined(args, "path.join")?))
}

fn path_resolve(args: &[Value]) -> Result<Value> {
    let relative = joined(args, "path.resolve")?;
    Ok(path_value(&path::absolute(relative)?))
}

fn path_basename(args: &[Value]) -> Result<Value> {
    let path = expect_string(&args[0], "path.basename")?;
    let name = Path::new(&path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Value::string(name))
}

fn path_dirname(args: &[Value]) -> Result<Value> {
    let path = expect_string(&args[0], "path.dirname")?;
    match Path::new(&path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => Ok(path_value(parent)),
        _ => Ok(Value::string(".")),
    }
}

fn path_extname(args: &[Value]) -> Result<Value> {
    let path = expect_string(&args[0], "path.extname")?;
    let ext = Path::new(&path)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    Ok(Value::string(ext))
}

fn os_module(_: &SinkRef) -> ModuleValue {
    module(
        "os",
        vec![
            ("platform", native("platform", 0, os_platform)),
            ("arch", native("arch", 0, os_arch)),
            ("tmpdir", native("tmpdir", 0, os_tmpdir)),
            ("homedir", native("homedir", 0, os_homedir)),
            ("cpus", native("cpus", 0, os_cpus)),
            ("EOL", Value::string(if cfg!(windows) { "\r\n" } else { "\n" })),
        ],
    )
}

fn os_platform(_args: &[Value]) -> Result<Value> {
    Ok(Value::string(env::consts::OS))
}

fn os_arch(_args: &[Value]) -> Result<Value> {
    Ok(Value::string(env::consts::ARCH))
}

fn os_tmpdir(_args: &[Value]) -> Result<Value> {
    Ok(path_value(&env::temp_dir()))
}

fn os_homedir(_args: &[Value]) -> Result<Value> {
    Ok(env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(Value::string)
        .unwrap_or_else(|_| Value::null()))
}

fn os_cpus(_args: &[Value]) -> Result<Value> {
    let count = thread::available_parallelism().map_or(1, usize::from);
    Ok(Value::int(count as i64))
}

fn child_process_module(_: &SinkRef) -> ModuleValue {
    module(
        "child_process",
        vec![("execSync", native("execSync", 1, child_exec_sync))],
    )
}

fn child_exec_sync(args: &[Value]) -> Result<Value> {
    let command = expect_string(&args[0], "child_process.execSync")?;
    let output = if cfg!(windows) {
        Command::new("cmd").arg("/C").arg(&command).output()?
    } else {
        Command::new("sh").arg("-c").arg(&command).output()?
    };
    if !output.status.success() {
        return Err(HostError::runtime(format!(
            "command `{command}` failed with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(Value::string(String::from_utf8_lossy(&output.stdout)))
}

fn timers_module(_: &SinkRef) -> ModuleValue {
    module("timers", vec![("sleep", native("sleep", 1, timers_sleep))])
}

fn timers_sleep(args: &[Value]) -> Result<Value> {
    let millis = expect_number(&args[0], "timers.sleep")?;
    if millis > 0.0 {
        thread::sleep(Duration::from_millis(millis as u64));
    }
    Ok(Value::null())
}

fn util_module(_: &SinkRef) -> ModuleValue {
    module("util", vec![("format", native("format", VARIADIC, util_format))])
}

fn util_format(args: &[Value]) -> Result<Value> {
    Ok(Value::string(display_joined(args)))
}

/// Space-separated display forms, as `print` and `util.format` render them.
pub(crate) fn display_joined(args: &[Value]) -> String {
    args.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

fn readline_module(sink: &SinkRef) -> ModuleValue {
    let sink = Rc::clone(sink);
    module(
        "readline",
        vec![(
            "question",
            Value::native("question", VARIADIC, move |args| {
                readline_question(&sink, args)
            }),
        )],
    )
}

/// The prompt goes to the sink so a tee'd log records it.
fn readline_question(sink: &SinkRef, args: &[Value]) -> Result<Value> {
    if let Some(prompt) = args.first() {
        sink.info(&prompt.to_string());
    }
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    if input.ends_with('\n') {
        input.pop();
        if input.ends_with('\r') {
            input.pop();
        }
    }
    Ok(Value::string(input))
}

fn buffer_module(_: &SinkRef) -> ModuleValue {
    module(
        "buffer",
        vec![
            ("toBase64", native("toBase64", 1, buffer_to_base64)),
            ("fromBase64", native("fromBase64", 1, buffer_from_base64)),
        ],
    )
}

fn buffer_to_base64(args: &[Value]) -> Result<Value> {
    let text = expect_string(&args[0], "buffer.toBase64")?;
    Ok(Value::string(STANDARD.encode(text.as_bytes())))
}

fn buffer_from_base64(args: &[Value]) -> Result<Value> {
    let bytes = base64_arg(&args[0], "buffer.fromBase64")?;
    Ok(Value::string(String::from_utf8_lossy(&bytes)))
}

fn base64_arg(value: &Value, name: &str) -> Result<Vec<u8>> {
    let text = expect_string(value, name)?;
    STANDARD
        .decode(text.trim())
        .map_err(|err| HostError::runtime(format!("`{name}` received invalid base64: {err}")))
}

/// Compressed payloads cross the script boundary as base64 text.
fn zlib_module(_: &SinkRef) -> ModuleValue {
    module(
        "zlib",
        vec![
            ("gzip", native("gzip", 1, zlib_gzip)),
            ("gunzip", native("gunzip", 1, zlib_gunzip)),
            ("deflate", native("deflate", 1, zlib_deflate)),
            ("inflate", native("inflate", 1, zlib_inflate)),
        ],
    )
}

fn zlib_gzip(args: &[Value]) -> Result<Value> {
    let text = expect_string(&args[0], "zlib.gzip")?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes())?;
    Ok(Value::string(STANDARD.encode(encoder.finish()?)))
}

fn zlib_gunzip(args: &[Value]) -> Result<Value> {
    let bytes = base64_arg(&args[0], "zlib.gunzip")?;
    let mut text = String::new();
    GzDecoder::new(bytes.as_slice()).read_to_string(&mut text)?;
    Ok(Value::string(text))
}

fn zlib_deflate(args: &[Value]) -> Result<Value> {
    let text = expect_string(&args[0], "zlib.deflate")?;
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes())?;
    Ok(Value::string(STANDARD.encode(encoder.finish()?)))
}

fn zlib_inflate(args: &[Value]) -> Result<Value> {
    let bytes = base64_arg(&args[0], "zlib.inflate")?;
    let mut text = String::new();
    ZlibDecoder::new(bytes.as_slice()).read_to_string(&mut text)?;
    Ok(Value::string(text))
}

type Listeners = Rc<RefCell<IndexMap<String, Vec<Value>>>>;

/// One emitter per import. Listeners are host functions; `off` removes a
/// listener by identity.
fn events_module(_: &SinkRef) -> ModuleValue {
    let listeners = Listeners::default();

    let registry = Rc::clone(&listeners);
    let on = Value::native("on", 2, move |args| {
        let event = expect_string(&args[0], "events.on")?;
        expect_function(&args[1], "events.on")?;
        registry
            .borrow_mut()
            .entry(event)
            .or_default()
            .push(args[1].clone());
        Ok(Value::null())
    });

    let registry = Rc::clone(&listeners);
    let off = Value::native("off", 2, move |args| {
        let event = expect_string(&args[0], "events.off")?;
        if let Some(list) = registry.borrow_mut().get_mut(&event) {
            list.retain(|listener| *listener != args[1]);
        }
        Ok(Value::null())
    });

    let registry = Rc::clone(&listeners);
    let emit = Value::native("emit", VARIADIC, move |args| {
        ensure_min(args, 1, "events.emit")?;
        let event = expect_string(&args[0], "events.emit")?;
        // Snapshot so listeners may subscribe or unsubscribe while running.
        let snapshot = registry.borrow().get(&event).cloned().unwrap_or_default();
        for listener in &snapshot {
            if let Some(function) = listener.as_function() {
                function.call(&args[1..])?;
            }
        }
        Ok(Value::bool(!snapshot.is_empty()))
    });

    let registry = listeners;
    let listener_count = Value::native("listenerCount", 1, move |args| {
        let event = expect_string(&args[0], "events.listenerCount")?;
        let count = registry.borrow().get(&event).map_or(0, Vec::len);
        Ok(Value::int(count as i64))
    });

    module(
        "events",
        vec![
            ("on", on),
            ("off", off),
            ("emit", emit),
            ("listenerCount", listener_count),
        ],
    )
}

fn net_module(_: &SinkRef) -> ModuleValue {
    module(
        "net",
        vec![
            ("isIP", native("isIP", 1, net_is_ip)),
            ("isIPv4", native("isIPv4", 1, net_is_ipv4)),
            ("isIPv6", native("isIPv6", 1, net_is_ipv6)),
        ],
    )
}

fn parse_ip(value: &Value) -> Option<IpAddr> {
    match value.kind() {
        ValueKind::String(text) => text.parse().ok(),
        _ => None,
    }
}

fn net_is_ip(args: &[Value]) -> Result<Value> {
    let version = match parse_ip(&args[0]) {
        Some(IpAddr::V4(_)) => 4,
        Some(IpAddr::V6(_)) => 6,
        None => 0,
    };
    Ok(Value::int(version))
}

fn net_is_ipv4(args: &[Value]) -> Result<Value> {
    Ok(Value::bool(matches!(parse_ip(&args[0]), Some(IpAddr::V4(_)))))
}

fn net_is_ipv6(args: &[Value]) -> Result<Value> {
    Ok(Value::bool(matches!(parse_ip(&args[0]), Some(IpAddr::V6(_)))))
}
