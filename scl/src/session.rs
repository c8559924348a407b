//! Interactive and batch simulator sessions.

use std::ffi::OsStr;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use itertools::Itertools;
use tracing::{debug, warn};

use crate::analysis::{AnalysisParams, AnalysisType};
use crate::command::{self, Scope};
use crate::config::Config;
use crate::error::{EntityKind, Error, Result};
use crate::parse::{AttrKind, Attributes, Response, Value};
use crate::results::{self, ResultSet};
use crate::Options;

/// The prompt the interpreter prints when ready for the next command.
const PROMPT: &[u8] = b"\n> ";

/// How long a stopping session waits for the simulator to exit on its own
/// before killing it.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// How a session drives the simulator.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum Mode {
    /// A long-lived subprocess accepting successive commands.
    #[default]
    Interactive,
    /// One-shot runs; command dispatch is rejected.
    Batch,
}

/// One running simulator attached to one netlist.
///
/// The subprocess and its command channel are owned exclusively by the
/// session: they are released on [`Session::stop`] and on drop, on every exit
/// path. All entity lookups are by name and scoped to this session; nothing
/// outlives it.
///
/// Dispatch is synchronous: each command blocks until its response arrives or
/// the configured timeout elapses. A timed-out command leaves the session
/// usable.
#[derive(Debug)]
pub struct Session {
    config: Config,
    netlist: PathBuf,
    raw_path: PathBuf,
    args: Vec<String>,
    mode: Mode,
    channel: Option<Channel>,
    raw_offset: usize,
}

impl Session {
    /// Starts a session for `netlist`.
    ///
    /// In interactive mode this spawns the simulator and waits for its first
    /// prompt; in batch mode the subprocess runs once inside each
    /// [`run_all`](Session::run_all) call instead.
    pub fn start(netlist: impl AsRef<Path>, options: Options) -> Result<Self> {
        let netlist = netlist.as_ref().to_path_buf();
        let config = match &options.config_path {
            Some(path) => Config::from_file(path)?,
            None => Config::discover(netlist.parent().unwrap_or(Path::new(".")))?,
        };

        if !netlist.is_file() {
            return Err(Error::Launch {
                command: config.executable.display().to_string(),
                reason: format!("netlist `{}` not found", netlist.display()),
            });
        }
        fs::File::open(&netlist).map_err(|e| Error::Launch {
            command: config.executable.display().to_string(),
            reason: format!("netlist `{}` is not readable: {e}", netlist.display()),
        })?;

        let raw_path = match options.raw_path {
            Some(path) => path,
            None => raw_tmp(&netlist)?,
        };

        let mut args = config.args.clone();
        if options.mode == Mode::Interactive {
            args.push("+interactive".to_string());
        }
        args.push("-raw".to_string());
        args.push(raw_path.display().to_string());
        for include in &options.includes {
            args.push(format!("-I{}", include.display()));
        }
        if let Some(preset) = options.aps {
            args.push(format!("++aps={preset}"));
        }
        if let Some(preset) = options.x_preset {
            args.push(format!("+preset={preset}"));
        }
        args.extend(options.extra_args.iter().cloned());
        args.push(netlist.display().to_string());

        let channel = match options.mode {
            Mode::Interactive => Some(Channel::open(&config, &args)?),
            Mode::Batch => None,
        };

        Ok(Self {
            config,
            netlist,
            raw_path,
            args,
            mode: options.mode,
            channel,
            raw_offset: 0,
        })
    }

    /// The netlist this session is attached to.
    pub fn netlist(&self) -> &Path {
        &self.netlist
    }

    /// Where the simulator writes raw results.
    pub fn raw_path(&self) -> &Path {
        &self.raw_path
    }

    /// How this session drives the simulator.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Whether the interactive subprocess is currently attached.
    pub fn is_running(&self) -> bool {
        self.channel.is_some()
    }

    /// Stops the session, terminating the subprocess.
    ///
    /// Sends the quit command and escalates to a kill if the simulator
    /// refuses to exit within a grace period. Idempotent: stopping an
    /// already-stopped or batch session does nothing.
    pub fn stop(&mut self) -> Result<()> {
        if let Some(channel) = self.channel.take() {
            channel.shutdown(SHUTDOWN_GRACE);
        }
        Ok(())
    }

    /// Sends an arbitrary SCL command and reports whether it succeeded.
    ///
    /// The interpreter silently swallows commands with unbalanced
    /// parentheses, wedging the channel; those are rejected here instead.
    pub fn raw_command(&mut self, command: &str) -> Result<bool> {
        if command.matches('(').count() != command.matches(')').count() {
            return Err(Error::Parse {
                command: command.to_string(),
                detail: "unbalanced parentheses".to_string(),
            });
        }
        Ok(self.exchange(command.to_string())?.succeeded())
    }

    /// Lists the netlist's analyses as `(name, type)` pairs.
    pub fn list_analyses(&mut self) -> Result<Vec<(String, String)>> {
        Ok(self.exchange(command::list_analyses())?.name_pairs())
    }

    /// Lists the circuit's instances as `(name, master)` pairs.
    pub fn list_instances(&mut self) -> Result<Vec<(String, String)>> {
        Ok(self.exchange(command::list_instances())?.name_pairs())
    }

    /// Lists the circuit's nets.
    pub fn list_nets(&mut self) -> Result<Vec<String>> {
        Ok(self.exchange(command::list_nets())?.quoted_names())
    }

    /// Lists the parameter names of an analysis.
    pub fn list_analysis_parameters(&mut self, analysis: &str) -> Result<Vec<String>> {
        let resp = self.exchange(command::list_parameters(Scope::Analysis(analysis)))?;
        if !resp.succeeded() {
            return Err(entity_err(Scope::Analysis(analysis), ""));
        }
        Ok(resp
            .value_pairs()?
            .into_iter()
            .map(|(name, _)| name)
            .collect())
    }

    /// Lists an instance's parameters with their current values.
    pub fn list_instance_parameters(&mut self, instance: &str) -> Result<Vec<(String, Value)>> {
        let resp = self.exchange(command::list_parameters(Scope::Instance(instance)))?;
        if !resp.succeeded() {
            return Err(entity_err(Scope::Instance(instance), ""));
        }
        resp.value_pairs()
    }

    /// The value of a netlist parameter.
    pub fn get_parameter(&mut self, param: &str) -> Result<f64> {
        let resp = self.exchange(command::get_attribute(Scope::Circuit, param, AttrKind::Value))?;
        if !resp.succeeded() {
            return Err(entity_err(Scope::Circuit, param));
        }
        let value = resp.scalar()?;
        value
            .as_f64()
            .ok_or_else(|| resp.parse_err(format!("`{param}` is not numeric")))
    }

    /// Sets the value of a netlist parameter.
    pub fn set_parameter(&mut self, param: &str, value: f64) -> Result<()> {
        self.set_attr(Scope::Circuit, param, AttrKind::Value, Value::Num(value))
    }

    /// The values of several netlist parameters, keyed by name.
    pub fn get_parameters<I, S>(&mut self, params: I) -> Result<IndexMap<String, f64>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut values = IndexMap::new();
        for param in params {
            let param = param.as_ref();
            let value = self.get_parameter(param)?;
            values.insert(param.to_string(), value);
        }
        Ok(values)
    }

    /// Sets several netlist parameters, failing on the first rejection.
    pub fn set_parameters<'a, I>(&mut self, params: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        for (param, value) in params {
            self.set_parameter(param, value)?;
        }
        Ok(())
    }

    /// The attribute structure of a circuit parameter.
    pub fn get_circuit_parameter(&mut self, param: &str) -> Result<Attributes> {
        self.attributes(Scope::Circuit, param)
    }

    /// Sets one attribute of a circuit parameter.
    pub fn set_circuit_parameter(
        &mut self,
        param: &str,
        attr: AttrKind,
        value: impl Into<Value>,
    ) -> Result<()> {
        self.set_attr(Scope::Circuit, param, attr, value.into())
    }

    /// The attribute structure of an instance parameter.
    pub fn get_instance_parameter(&mut self, instance: &str, param: &str) -> Result<Attributes> {
        self.attributes(Scope::Instance(instance), param)
    }

    /// Sets one attribute of an instance parameter.
    pub fn set_instance_parameter(
        &mut self,
        instance: &str,
        param: &str,
        attr: AttrKind,
        value: impl Into<Value>,
    ) -> Result<()> {
        self.set_attr(Scope::Instance(instance), param, attr, value.into())
    }

    /// The attribute structure of an analysis parameter.
    pub fn get_analysis_parameter(&mut self, analysis: &str, param: &str) -> Result<Attributes> {
        self.attributes(Scope::Analysis(analysis), param)
    }

    /// Sets one attribute of an analysis parameter.
    pub fn set_analysis_parameter(
        &mut self,
        analysis: &str,
        param: &str,
        attr: AttrKind,
        value: impl Into<Value>,
    ) -> Result<()> {
        self.set_attr(Scope::Analysis(analysis), param, attr, value.into())
    }

    /// Declares a new analysis of the given type.
    pub fn create_analysis(&mut self, name: &str, kind: AnalysisType) -> Result<()> {
        let resp = self.exchange(command::create_analysis(name, kind))?;
        if !resp.succeeded() {
            return Err(resp.parse_err("analysis declaration rejected"));
        }
        Ok(())
    }

    /// Declares a new analysis and applies a typed parameter bundle to it.
    pub fn create_analysis_with<P: AnalysisParams>(&mut self, name: &str, params: &P) -> Result<()> {
        self.create_analysis(name, P::TYPE)?;
        for (param, value) in params.params() {
            self.set_analysis_parameter(name, param, AttrKind::Value, value)?;
        }
        Ok(())
    }

    /// Runs every analysis in the netlist and loads the results.
    ///
    /// On an interactive session, repeated runs decode only the plots
    /// appended to the rawfile since the previous run.
    pub fn run_all(&mut self) -> Result<ResultSet> {
        match self.mode {
            Mode::Interactive => {
                let resp = self.exchange(command::run_all())?;
                if !resp.succeeded() {
                    return Err(resp.parse_err("run rejected"));
                }
            }
            Mode::Batch => self.run_batch()?,
        }
        let (set, next) = results::load_from(&self.raw_path, self.raw_offset)?;
        self.raw_offset = next;
        Ok(set)
    }

    /// Runs one named analysis and loads the full result file.
    pub fn run_analysis(&mut self, analysis: &str) -> Result<ResultSet> {
        let resp = self.exchange(command::run_analysis(analysis))?;
        if !resp.succeeded() {
            return Err(Error::UnknownEntity {
                kind: EntityKind::Analysis,
                name: analysis.to_string(),
            });
        }
        let (set, _) = results::load_from(&self.raw_path, 0)?;
        Ok(set)
    }

    fn attributes(&mut self, scope: Scope, param: &str) -> Result<Attributes> {
        let resp = self.exchange(command::list_attributes(scope, param))?;
        if !resp.succeeded() {
            return Err(entity_err(scope, param));
        }
        resp.attributes()
    }

    fn set_attr(&mut self, scope: Scope, param: &str, attr: AttrKind, value: Value) -> Result<()> {
        let resp = self.exchange(command::set_attribute(scope, param, attr, &value))?;
        if !resp.succeeded() {
            return Err(entity_err(scope, param));
        }
        Ok(())
    }

    /// Sends one command and reads its response block.
    fn exchange(&mut self, command: String) -> Result<Response> {
        let timeout = self.config.timeout();
        let channel = self.channel.as_mut().ok_or(Error::NotInteractive)?;
        debug!(command = %command, "dispatching");
        channel.stdin.write_all(command.as_bytes())?;
        channel.stdin.write_all(b"\n")?;
        channel.stdin.flush()?;
        let text = channel.read_until_prompt(&command, timeout)?;
        Ok(Response::new(command, &text))
    }

    fn run_batch(&mut self) -> Result<()> {
        let command = format!(
            "{} {}",
            self.config.executable.display(),
            self.args.iter().join(" ")
        );
        debug!(command = %command, "running batch simulation");
        let status = Command::new(&self.config.executable)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| Error::Launch {
                command: command.clone(),
                reason: e.to_string(),
            })?;
        if !status.success() {
            return Err(Error::Launch {
                command,
                reason: format!("exited with {status}"),
            });
        }
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(channel) = self.channel.take() {
            channel.shutdown(SHUTDOWN_GRACE);
        }
    }
}

/// Which entity a `nil` response most plausibly failed to resolve: the named
/// scope when there is one, the parameter otherwise.
fn entity_err(scope: Scope, param: &str) -> Error {
    match scope {
        Scope::Circuit => Error::UnknownEntity {
            kind: EntityKind::Parameter,
            name: param.to_string(),
        },
        Scope::Instance(name) => Error::UnknownEntity {
            kind: EntityKind::Instance,
            name: name.to_string(),
        },
        Scope::Analysis(name) => Error::UnknownEntity {
            kind: EntityKind::Analysis,
            name: name.to_string(),
        },
    }
}

/// A fresh raw-results path in the temp dir, named after the netlist.
fn raw_tmp(netlist: &Path) -> Result<PathBuf> {
    let stem = netlist
        .file_stem()
        .and_then(OsStr::to_str)
        .unwrap_or("netlist");
    let file = tempfile::Builder::new()
        .prefix(stem)
        .suffix(".raw")
        .tempfile()?;
    file.into_temp_path()
        .keep()
        .map_err(|e| Error::Io(e.error))
}

/// The open command channel to an interactive subprocess.
///
/// A detached thread drains the child's stdout into a channel so that prompt
/// reads can be bounded by `recv_timeout`; it exits on its own once the pipe
/// closes.
#[derive(Debug)]
struct Channel {
    child: Child,
    stdin: ChildStdin,
    rx: Receiver<Vec<u8>>,
    buf: Vec<u8>,
}

impl Channel {
    fn open(config: &Config, args: &[String]) -> Result<Self> {
        let command = format!("{} {}", config.executable.display(), args.iter().join(" "));
        debug!(command = %command, "launching simulator");
        let mut child = Command::new(&config.executable)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::Launch {
                command: command.clone(),
                reason: e.to_string(),
            })?;
        let stdin = child.stdin.take().ok_or_else(|| Error::Launch {
            command: command.clone(),
            reason: "no stdin handle".to_string(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| Error::Launch {
            command: command.clone(),
            reason: "no stdout handle".to_string(),
        })?;

        let (tx, rx) = mpsc::channel();
        let _reader = thread::Builder::new()
            .name("spectre-stdout".to_string())
            .spawn(move || {
                let mut stdout = stdout;
                let mut chunk = [0u8; 4096];
                loop {
                    match stdout.read(&mut chunk) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if tx.send(chunk[..n].to_vec()).is_err() {
                                break;
                            }
                        }
                    }
                }
            })
            .map_err(|e| Error::Launch {
                command: command.clone(),
                reason: e.to_string(),
            })?;

        let mut channel = Self {
            child,
            stdin,
            rx,
            buf: Vec::new(),
        };
        // The interpreter prints a banner, then the first prompt.
        match channel.read_until_prompt("<startup>", config.timeout()) {
            Ok(_) => Ok(channel),
            Err(e) => {
                channel.shutdown(Duration::from_millis(100));
                Err(Error::Launch {
                    command,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Accumulates output until the prompt appears, returning the block
    /// printed before it.
    fn read_until_prompt(&mut self, command: &str, timeout: Duration) -> Result<String> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some((end, consumed)) = split_at_prompt(&self.buf) {
                let block = String::from_utf8_lossy(&self.buf[..end]).into_owned();
                self.buf.drain(..consumed);
                return Ok(block);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Timeout {
                    command: command.to_string(),
                    after: timeout,
                });
            }
            match self.rx.recv_timeout(deadline - now) {
                Ok(chunk) => self.buf.extend_from_slice(&chunk),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(Error::Timeout {
                        command: command.to_string(),
                        after: timeout,
                    })
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(Error::Io(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "simulator closed its output stream",
                    )))
                }
            }
        }
    }

    /// Quits the simulator, escalating to a kill after `grace`.
    fn shutdown(mut self, grace: Duration) {
        let _ = self
            .stdin
            .write_all(command::quit().as_bytes())
            .and_then(|_| self.stdin.write_all(b"\n"))
            .and_then(|_| self.stdin.flush());
        drop(self.stdin);
        let deadline = Instant::now() + grace;
        loop {
            match self.child.try_wait() {
                Ok(Some(_)) => break,
                Ok(None) if Instant::now() < deadline => thread::sleep(Duration::from_millis(10)),
                _ => {
                    warn!("simulator refused to exit gracefully, killing");
                    let _ = self.child.kill();
                    let _ = self.child.wait();
                    break;
                }
            }
        }
    }
}

fn split_at_prompt(buf: &[u8]) -> Option<(usize, usize)> {
    if buf.starts_with(b"> ") {
        return Some((0, 2));
    }
    buf.windows(PROMPT.len())
        .position(|w| w == PROMPT)
        .map(|pos| (pos, pos + PROMPT.len()))
}
