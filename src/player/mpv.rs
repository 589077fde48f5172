use std::collections::VecDeque;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command as ProcessCommand, Stdio};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, anyhow};
use log::{debug, info, warn};
use serde_json::{Value, json};

use super::engine::{Engine, EngineFactory, ListenerId, NativeListener};
use super::options::PlaybackSnapshot;
use super::surface::Surface;

const CONNECT_ATTEMPTS: usize = 50;
const CONNECT_DELAY: Duration = Duration::from_millis(40);
const QUIT_GRACE: Duration = Duration::from_millis(500);
const REAP_POLL: Duration = Duration::from_millis(20);

const OBSERVED_PROPERTIES: [&str; 9] = [
    "time-pos",
    "duration",
    "pause",
    "volume",
    "mute",
    "speed",
    "fullscreen",
    "paused-for-cache",
    "cache-buffering-state",
];

type NativeEvent = (&'static str, Vec<Value>);

/// Starts one `mpv` process per engine and drives it over its JSON IPC socket.
#[derive(Debug, Clone)]
pub(crate) struct MpvFactory {
    bin: PathBuf,
    socket_dir: PathBuf,
}

impl MpvFactory {
    pub(crate) fn new(bin: PathBuf, socket_dir: PathBuf) -> Self {
        Self { bin, socket_dir }
    }

    fn socket_path(&self) -> PathBuf {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        self.socket_dir
            .join(format!("vodwatch-mpv-{}-{ts}.sock", std::process::id()))
    }
}

impl EngineFactory for MpvFactory {
    fn construct(&self, snapshot: &PlaybackSnapshot, surface: &Surface) -> Result<Box<dyn Engine>> {
        let socket = self.socket_path();
        let args = build_args(snapshot, surface, &socket);
        debug!("launching {} {}", self.bin.display(), args.join(" "));

        let child = ProcessCommand::new(&self.bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .process_group(0)
            .spawn()
            .with_context(|| format!("failed to launch {}", self.bin.display()))?;

        let (tx, rx) = mpsc::channel();
        let ipc_socket = socket.clone();
        thread::spawn(move || run_ipc(&ipc_socket, &tx));

        let mut engine = MpvEngine {
            child: Some(child),
            link: Link::Connecting,
            outbox: Vec::new(),
            events: rx,
            listeners: Vec::new(),
            next_listener: 0,
            pending: VecDeque::from([("ready", Vec::new())]),
            state: MpvState::from_snapshot(snapshot),
            socket,
        };
        for (idx, property) in OBSERVED_PROPERTIES.iter().enumerate() {
            engine.command(json!(["observe_property", idx + 1, property]));
        }
        if let Some(child) = &engine.child {
            info!("mpv started (pid {})", child.id());
        }
        Ok(Box::new(engine))
    }
}

enum Inbound {
    Connected(UnixStream),
    Message(Value),
    Unreachable(String),
}

enum Link {
    Connecting,
    Connected(UnixStream),
    Lost,
}

/// Runs on its own thread: waits for mpv's socket, hands a writer back to
/// the engine, then forwards every IPC line until the socket closes.
fn run_ipc(socket: &Path, tx: &Sender<Inbound>) {
    let stream = match connect_ipc(socket) {
        Ok(stream) => stream,
        Err(err) => {
            let _ = tx.send(Inbound::Unreachable(format!("{err:#}")));
            return;
        }
    };
    match stream.try_clone() {
        Ok(writer) => {
            if tx.send(Inbound::Connected(writer)).is_err() {
                return;
            }
        }
        Err(err) => {
            let _ = tx.send(Inbound::Unreachable(format!(
                "failed to clone mpv IPC stream: {err}"
            )));
            return;
        }
    }

    for line in BufReader::new(stream).lines() {
        let Ok(line) = line else {
            break;
        };
        match serde_json::from_str::<Value>(&line) {
            Ok(message) => {
                if tx.send(Inbound::Message(message)).is_err() {
                    break;
                }
            }
            Err(err) => debug!("ignoring malformed mpv IPC line: {err}"),
        }
    }
}

fn connect_ipc(socket: &Path) -> Result<UnixStream> {
    for _ in 0..CONNECT_ATTEMPTS {
        if let Ok(stream) = UnixStream::connect(socket) {
            return Ok(stream);
        }
        thread::sleep(CONNECT_DELAY);
    }
    Err(anyhow!(
        "mpv IPC socket {} did not become ready",
        socket.display()
    ))
}

/// Waits out the quit grace period, then kills. Runs off the UI thread.
fn reap(mut child: Child, socket: PathBuf) {
    let deadline = Instant::now() + QUIT_GRACE;
    loop {
        match child.try_wait() {
            Ok(Some(_)) => break,
            Ok(None) if Instant::now() < deadline => thread::sleep(REAP_POLL),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                break;
            }
        }
    }
    let _ = fs::remove_file(&socket);
    debug!("mpv reaped; removed {}", socket.display());
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct MpvState {
    url: Option<String>,
    paused: bool,
    duration: f64,
    position: f64,
    volume: f64,
    muted: bool,
}

impl MpvState {
    fn from_snapshot(snapshot: &PlaybackSnapshot) -> Self {
        let fields = &snapshot.fields;
        Self {
            url: fields.url.clone(),
            paused: fields.autoplay == Some(false),
            duration: 0.0,
            position: 0.0,
            volume: fields.volume.unwrap_or(1.0),
            muted: fields.muted.unwrap_or(false),
        }
    }
}

/// Maps one mpv IPC message onto native event names, updating `state`.
pub(crate) fn translate(state: &mut MpvState, message: &Value, out: &mut VecDeque<NativeEvent>) {
    let Some(event) = message.get("event").and_then(Value::as_str) else {
        if let Some(error) = message.get("error").and_then(Value::as_str)
            && error != "success"
        {
            debug!("mpv command failed: {error}");
        }
        return;
    };

    match event {
        "property-change" => {
            let name = message.get("name").and_then(Value::as_str).unwrap_or("");
            property_changed(state, name, message.get("data"), out);
        }
        "file-loaded" => {
            out.push_back(("loadeddata", Vec::new()));
            out.push_back(("loadedmetadata", Vec::new()));
        }
        "seek" => out.push_back(("seeking", vec![json!(state.position)])),
        "playback-restart" => out.push_back(("seeked", vec![json!(state.position)])),
        "end-file" => match message.get("reason").and_then(Value::as_str) {
            Some("eof") => out.push_back(("ended", Vec::new())),
            Some("error") => {
                let detail = message
                    .get("file_error")
                    .and_then(Value::as_str)
                    .unwrap_or("playback error");
                out.push_back(("error", vec![json!(detail)]));
            }
            reason => debug!("mpv end-file ({reason:?})"),
        },
        "video-reconfig" => out.push_back(("resize", Vec::new())),
        "shutdown" => out.push_back(("destroy", Vec::new())),
        other => debug!("unhandled mpv event {other}"),
    }
}

fn property_changed(
    state: &mut MpvState,
    name: &str,
    data: Option<&Value>,
    out: &mut VecDeque<NativeEvent>,
) {
    let number = data.and_then(Value::as_f64);
    let flag = data.and_then(Value::as_bool);
    match (name, number, flag) {
        ("time-pos", Some(position), _) => {
            state.position = position;
            out.push_back(("timeupdate", vec![json!(position)]));
        }
        ("duration", Some(duration), _) => state.duration = duration,
        ("pause", _, Some(paused)) => {
            state.paused = paused;
            if paused {
                out.push_back(("pause", Vec::new()));
            } else {
                out.push_back(("play", Vec::new()));
                out.push_back(("playing", Vec::new()));
            }
        }
        ("volume", Some(volume), _) => {
            state.volume = volume / 100.0;
            out.push_back(("volumechange", vec![json!(state.volume), json!(state.muted)]));
        }
        ("mute", _, Some(muted)) => {
            state.muted = muted;
            out.push_back(("volumechange", vec![json!(state.volume), json!(state.muted)]));
        }
        ("speed", Some(speed), _) => out.push_back(("ratechange", vec![json!(speed)])),
        ("fullscreen", _, Some(fullscreen)) => {
            out.push_back(("fullscreen", vec![json!(fullscreen)]));
        }
        ("paused-for-cache", _, Some(true)) => out.push_back(("waiting", Vec::new())),
        ("paused-for-cache", _, Some(false)) => out.push_back(("playing", Vec::new())),
        ("cache-buffering-state", Some(percent), _) => {
            out.push_back(("progress", vec![json!(percent / 100.0)]));
        }
        _ => {}
    }
}

pub(crate) struct MpvEngine {
    child: Option<Child>,
    link: Link,
    /// Commands issued before the socket is up.
    outbox: Vec<String>,
    events: Receiver<Inbound>,
    listeners: Vec<(ListenerId, String, NativeListener)>,
    next_listener: ListenerId,
    pending: VecDeque<NativeEvent>,
    state: MpvState,
    socket: PathBuf,
}

impl MpvEngine {
    fn command(&mut self, args: Value) {
        let mut line = json!({ "command": args }).to_string();
        line.push('\n');
        match &mut self.link {
            Link::Connecting => self.outbox.push(line),
            Link::Connected(writer) => {
                if let Err(err) = writer.write_all(line.as_bytes()) {
                    warn!("mpv IPC write failed: {err}");
                }
            }
            Link::Lost => debug!("mpv IPC is gone; dropping command {line:?}"),
        }
    }

    fn connected(&mut self, mut writer: UnixStream) {
        for line in self.outbox.drain(..) {
            if let Err(err) = writer.write_all(line.as_bytes()) {
                warn!("mpv IPC write failed: {err}");
                break;
            }
        }
        debug!("mpv IPC connected on {}", self.socket.display());
        self.link = Link::Connected(writer);
    }

    fn lost(&mut self, detail: String) {
        if matches!(self.link, Link::Lost) {
            return;
        }
        warn!("{detail}");
        self.link = Link::Lost;
        self.outbox.clear();
        self.pending.push_back(("error", vec![json!(detail)]));
        self.pending.push_back(("destroy", Vec::new()));
    }

    /// mpv can die before its socket appears; notice that without waiting
    /// for the connect timeout.
    fn check_startup_exit(&mut self) {
        if !matches!(self.link, Link::Connecting) {
            return;
        }
        let exited = match self.child.as_mut().map(Child::try_wait) {
            Some(Ok(Some(status))) => Some(format!(
                "mpv exited before opening its IPC socket ({status})"
            )),
            Some(Err(err)) => Some(format!("failed waiting on mpv: {err}")),
            _ => None,
        };
        if let Some(detail) = exited {
            self.lost(detail);
        }
    }

    fn set_property(&mut self, name: &str, value: Value) {
        self.command(json!(["set_property", name, value]));
    }

    fn dispatch(&mut self, event: &str, args: &[Value]) {
        for (_, name, listener) in self.listeners.iter_mut() {
            if name == event {
                listener(args);
            }
        }
    }
}

impl Engine for MpvEngine {
    fn play(&mut self) {
        self.set_property("pause", json!(false));
        self.state.paused = false;
    }

    fn pause(&mut self) {
        self.set_property("pause", json!(true));
        self.state.paused = true;
    }

    fn toggle(&mut self) {
        self.command(json!(["cycle", "pause"]));
        self.state.paused = !self.state.paused;
    }

    fn seek(&mut self, time: f64) {
        self.command(json!(["seek", time, "absolute"]));
        self.state.position = time;
    }

    fn set_volume(&mut self, volume: f64) {
        self.set_property("volume", json!(volume * 100.0));
        self.state.volume = volume;
    }

    fn set_muted(&mut self, muted: bool) {
        self.set_property("mute", json!(muted));
        self.state.muted = muted;
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.set_property("speed", json!(rate));
    }

    fn set_poster(&mut self, poster: &str) {
        debug!("mpv has no poster surface; ignoring {poster}");
    }

    fn switch_url(&mut self, url: &str) {
        self.command(json!(["loadfile", url, "replace"]));
        self.state.url = Some(url.to_string());
        self.state.position = 0.0;
        self.state.duration = 0.0;
        self.pending.push_back(("switch", vec![json!(url)]));
    }

    fn url(&self) -> Option<&str> {
        self.state.url.as_deref()
    }

    fn playing(&self) -> bool {
        !self.state.paused
    }

    fn duration(&self) -> f64 {
        self.state.duration
    }

    fn current_time(&self) -> f64 {
        self.state.position
    }

    fn volume(&self) -> f64 {
        self.state.volume
    }

    fn muted(&self) -> bool {
        self.state.muted
    }

    fn on(&mut self, event: &str, listener: NativeListener) -> ListenerId {
        self.next_listener += 1;
        self.listeners
            .push((self.next_listener, event.to_string(), listener));
        self.next_listener
    }

    fn off(&mut self, id: ListenerId) {
        self.listeners.retain(|(listener_id, _, _)| *listener_id != id);
    }

    fn pump(&mut self) {
        let inbound: Vec<Inbound> = self.events.try_iter().collect();
        for item in inbound {
            match item {
                Inbound::Connected(writer) => self.connected(writer),
                Inbound::Message(message) => {
                    translate(&mut self.state, &message, &mut self.pending);
                }
                Inbound::Unreachable(detail) => self.lost(detail),
            }
        }
        self.check_startup_exit();
        while let Some((event, args)) = self.pending.pop_front() {
            self.dispatch(event, &args);
        }
    }

    fn destroy(mut self: Box<Self>) {
        self.pending.clear();
        self.dispatch("destroy", &[]);
        self.command(json!(["quit"]));
    }
}

impl Drop for MpvEngine {
    fn drop(&mut self) {
        if let Link::Connected(writer) = &self.link {
            let _ = writer.shutdown(std::net::Shutdown::Both);
        }
        if let Some(child) = self.child.take() {
            let socket = self.socket.clone();
            thread::spawn(move || reap(child, socket));
        }
    }
}
