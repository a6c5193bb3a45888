#![allow(clippy::unwrap_used)]
// In-process controller simulator speaking both services over plain
// TCP: the ACI config service (XML frames) and the Host Command
// service (CRLF lines). Just enough behavior for the end-to-end
// scenarios.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use vantage_core::{SessionConfig, Vid};

pub struct SimLoad {
    pub vid: Vid,
    pub name: String,
    pub level: f64,
}

struct SimState {
    credentials: Option<(String, String)>,
    loads: Mutex<HashMap<Vid, SimLoad>>,
    load_order: Vec<Vid>,
    variables: Mutex<HashMap<Vid, String>>,
    /// Live HC connections: event sink + kill switch.
    hc_conns: Mutex<Vec<(mpsc::UnboundedSender<String>, CancellationToken)>>,
    hc_accepted: AtomicUsize,
    /// Every line received on any HC connection, in arrival order.
    hc_log: Mutex<Vec<String>>,
}

pub struct Simulator {
    pub aci_port: u16,
    pub hc_port: u16,
    state: Arc<SimState>,
}

impl Simulator {
    pub async fn start(credentials: Option<(&str, &str)>, loads: Vec<SimLoad>) -> Self {
        let load_order = loads.iter().map(|l| l.vid).collect();
        let state = Arc::new(SimState {
            credentials: credentials.map(|(u, p)| (u.to_string(), p.to_string())),
            loads: Mutex::new(loads.into_iter().map(|l| (l.vid, l)).collect()),
            load_order,
            variables: Mutex::new(HashMap::new()),
            hc_conns: Mutex::new(Vec::new()),
            hc_accepted: AtomicUsize::new(0),
            hc_log: Mutex::new(Vec::new()),
        });

        let aci = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let hc = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let aci_port = aci.local_addr().unwrap().port();
        let hc_port = hc.local_addr().unwrap().port();

        let aci_state = Arc::clone(&state);
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = aci.accept().await else {
                    return;
                };
                tokio::spawn(serve_aci(stream, Arc::clone(&aci_state)));
            }
        });

        let hc_state = Arc::clone(&state);
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = hc.accept().await else {
                    return;
                };
                hc_state.hc_accepted.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve_hc(stream, Arc::clone(&hc_state)));
            }
        });

        Self {
            aci_port,
            hc_port,
            state,
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        let mut config = SessionConfig::new("127.0.0.1").without_tls();
        config.config_port = Some(self.aci_port);
        config.command_port = Some(self.hc_port);
        config.response_timeout = Duration::from_secs(2);
        config
    }

    /// Push a raw event line to every live HC connection.
    pub fn emit(&self, line: &str) {
        let conns = self.state.hc_conns.lock().unwrap();
        for (sink, _) in conns.iter() {
            let _ = sink.send(line.to_string());
        }
    }

    pub fn emit_load_status(&self, vid: Vid, level: f64) {
        let millipercent = (level * 1000.0).round() as i64;
        self.emit(&format!("S:STATUS {vid} Load.GetLevel {millipercent}"));
    }

    /// Sever every HC connection, as if the network dropped.
    pub fn kill_hc_connections(&self) {
        let mut conns = self.state.hc_conns.lock().unwrap();
        for (_, cancel) in conns.drain(..) {
            cancel.cancel();
        }
    }

    pub fn hc_connection_count(&self) -> usize {
        self.state.hc_accepted.load(Ordering::SeqCst)
    }

    pub fn hc_log(&self) -> Vec<String> {
        self.state.hc_log.lock().unwrap().clone()
    }

    pub fn load_level(&self, vid: Vid) -> Option<f64> {
        self.state.loads.lock().unwrap().get(&vid).map(|l| l.level)
    }

    /// Wait until `predicate` holds over the HC command log.
    pub async fn wait_for_hc_log(&self, predicate: impl Fn(&[String]) -> bool) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            if predicate(&self.hc_log()) {
                return;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for HC traffic; log: {:?}",
                self.hc_log()
            );
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }
}

// ── ACI service ─────────────────────────────────────────────────────

async fn serve_aci(mut stream: TcpStream, state: Arc<SimState>) {
    let mut buf: Vec<u8> = Vec::new();
    let mut authenticated = state.credentials.is_none();
    let mut filters: HashMap<i32, (Vec<String>, usize)> = HashMap::new();
    let mut next_handle = 1;

    while let Some(request) = recv_frame(&mut stream, &mut buf).await {
        let response = if request.contains("<Login>") {
            let ok = match &state.credentials {
                Some((user, pass)) => {
                    request.contains(&format!("<User>{user}</User>"))
                        && request.contains(&format!("<Password>{pass}</Password>"))
                }
                None => true,
            };
            if ok {
                authenticated = true;
            }
            format!("<ILogin><Login><return>{ok}</return></Login></ILogin>\n")
        } else if !authenticated {
            "<IConfiguration><OpenFilter></OpenFilter></IConfiguration>\n".to_string()
        } else if request.contains("<GetVersion>") {
            concat!(
                "<IIntrospection><GetVersion><return>",
                "<kernel>5.10</kernel><rootfs>2.0.1</rootfs><app>4.2.7</app>",
                "</return></GetVersion></IIntrospection>\n"
            )
            .to_string()
        } else if request.contains("<OpenFilter>") {
            let mut objects = Vec::new();
            if request.contains("<ObjectType>Load</ObjectType>") {
                let loads = state.loads.lock().unwrap();
                for vid in &state.load_order {
                    if let Some(load) = loads.get(vid) {
                        objects.push(format!(
                            "<Object><Load VID=\"{}\" Master=\"1\"><Name>{}</Name><Model/><Note/><Area>5</Area><LoadType>Incandescent</LoadType></Load></Object>",
                            load.vid, load.name
                        ));
                    }
                }
            }
            let handle = next_handle;
            next_handle += 1;
            filters.insert(handle, (objects, 0));
            format!(
                "<IConfiguration><OpenFilter><return>{handle}</return></OpenFilter></IConfiguration>\n"
            )
        } else if request.contains("<GetFilterResults>") {
            let handle: i32 = extract(&request, "hFilter").parse().unwrap();
            let count: usize = extract(&request, "Count").parse().unwrap();
            let page = match filters.get_mut(&handle) {
                Some((objects, cursor)) => {
                    let page: Vec<String> =
                        objects.iter().skip(*cursor).take(count).cloned().collect();
                    *cursor += page.len();
                    page
                }
                None => Vec::new(),
            };
            format!(
                "<IConfiguration><GetFilterResults><return>{}</return></GetFilterResults></IConfiguration>\n",
                page.join("")
            )
        } else if request.contains("<CloseFilter>") {
            "<IConfiguration><CloseFilter><return>true</return></CloseFilter></IConfiguration>\n"
                .to_string()
        } else if request.contains("<GetObject>") {
            let loads = state.loads.lock().unwrap();
            let mut objects = Vec::new();
            for load in loads.values() {
                if request.contains(&format!("<VID>{}</VID>", load.vid)) {
                    objects.push(format!(
                        "<Object><Load VID=\"{}\"><Name>{}</Name><LoadType>Incandescent</LoadType></Load></Object>",
                        load.vid, load.name
                    ));
                }
            }
            format!(
                "<IConfiguration><GetObject><return>{}</return></GetObject></IConfiguration>\n",
                objects.join("")
            )
        } else {
            panic!("simulator ACI got unexpected request: {request}");
        };

        if stream.write_all(response.as_bytes()).await.is_err() {
            return;
        }
    }
}

async fn recv_frame(stream: &mut TcpStream, buf: &mut Vec<u8>) -> Option<String> {
    loop {
        if let Some(frame) = try_extract_frame(buf) {
            return Some(frame);
        }
        let mut chunk = [0u8; 4096];
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

fn try_extract_frame(buf: &mut Vec<u8>) -> Option<String> {
    let text = String::from_utf8(buf.clone()).ok()?;
    let start = text.find('<')?;
    let name_end = text[start + 1..].find(['>', ' '])? + start + 1;
    let root = text[start + 1..name_end].to_string();
    let close = format!("</{root}>");
    let end = text.find(&close)? + close.len();
    let frame = text[start..end].to_string();
    buf.drain(..end);
    Some(frame)
}

fn extract(request: &str, element: &str) -> String {
    let open = format!("<{element}>");
    let close = format!("</{element}>");
    let start = request.find(&open).unwrap() + open.len();
    let end = request.find(&close).unwrap();
    request[start..end].to_string()
}

// ── Host Command service ────────────────────────────────────────────

async fn serve_hc(stream: TcpStream, state: Arc<SimState>) {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();
    let (sink, mut events) = mpsc::unbounded_channel::<String>();
    let cancel = CancellationToken::new();
    state
        .hc_conns
        .lock()
        .unwrap()
        .push((sink, cancel.clone()));

    let mut authenticated = state.credentials.is_none();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => {
                let Some(event) = event else { break };
                if write_half
                    .write_all(format!("{event}\r\n").as_bytes())
                    .await
                    .is_err()
                {
                    break;
                }
            }
            line = lines.next_line() => {
                let Ok(Some(line)) = line else { break };
                state.hc_log.lock().unwrap().push(line.clone());

                let (replies, broadcasts) = handle_hc_line(&state, &mut authenticated, &line);
                for reply in replies {
                    if write_half
                        .write_all(format!("{reply}\r\n").as_bytes())
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
                for broadcast in broadcasts {
                    let conns = state.hc_conns.lock().unwrap();
                    for (other, _) in conns.iter() {
                        let _ = other.send(broadcast.clone());
                    }
                }
            }
        }
    }
}

fn handle_hc_line(
    state: &SimState,
    authenticated: &mut bool,
    line: &str,
) -> (Vec<String>, Vec<String>) {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let mut broadcasts = Vec::new();

    let reply = match tokens.as_slice() {
        ["LOGIN", user, pass] => match &state.credentials {
            Some((expected_user, expected_pass))
                if user == expected_user && pass == expected_pass =>
            {
                *authenticated = true;
                "R:LOGIN".to_string()
            }
            None => "R:LOGIN".to_string(),
            Some(_) => "R:ERROR:23 Login failed".to_string(),
        },
        _ if !*authenticated => "R:ERROR:21 Login required".to_string(),
        ["ECHO"] => "R:ECHO".to_string(),
        ["VERSION"] => "R:VERSION 4.2".to_string(),
        ["STATUS", category] => format!("R:STATUS {category}"),
        ["ADDSTATUS", vid] => format!("R:ADDSTATUS {vid}"),
        ["DELSTATUS", vid] => format!("R:DELSTATUS {vid}"),
        // This firmware predates the enhanced log.
        ["ELENABLE", ..] | ["ELLOG", ..] => "R:ERROR:8 Not implemented".to_string(),
        ["TASK", vid, event] => format!("R:TASK {vid} {event}"),
        ["GETVARIABLE", vid] => {
            let variables = state.variables.lock().unwrap();
            let value = variables.get(&vid.parse().unwrap()).cloned();
            match value {
                Some(value) => format!("R:GETVARIABLE {vid} {value}"),
                None => "R:ERROR:7 Invalid VID".to_string(),
            }
        }
        ["VARIABLE", vid, value] => {
            state
                .variables
                .lock()
                .unwrap()
                .insert(vid.parse().unwrap(), value.to_string());
            broadcasts.push(format!("S:VARIABLE {vid} {value}"));
            format!("R:VARIABLE {vid} {value}")
        }
        ["INVOKE", vid, method, args @ ..] => {
            let vid_num: Vid = vid.parse().unwrap();
            let mut loads = state.loads.lock().unwrap();
            match (*method, loads.get_mut(&vid_num)) {
                ("Load.GetLevel", Some(load)) => {
                    format!("R:INVOKE {vid} {:.3} Load.GetLevel", load.level)
                }
                ("Load.SetLevel", Some(load)) => {
                    let level: f64 = args.first().and_then(|a| a.parse().ok()).unwrap_or(0.0);
                    load.level = level;
                    let millipercent = (level * 1000.0).round() as i64;
                    broadcasts.push(format!("S:STATUS {vid} Load.GetLevel {millipercent}"));
                    format!("R:INVOKE {vid} 0 Load.SetLevel {level:.3}")
                }
                ("Load.Ramp", Some(load)) => {
                    let level: f64 = args.get(2).and_then(|a| a.parse().ok()).unwrap_or(0.0);
                    load.level = level;
                    let millipercent = (level * 1000.0).round() as i64;
                    broadcasts.push(format!("S:STATUS {vid} Load.GetLevel {millipercent}"));
                    format!("R:INVOKE {vid} 0 Load.Ramp")
                }
                (_, Some(_)) => format!("R:INVOKE {vid} 0 {method}"),
                (_, None) => "R:ERROR:7 Invalid VID".to_string(),
            }
        }
        _ => "R:ERROR:6 Syntax error".to_string(),
    };

    (vec![reply], broadcasts)
}
