// MIT License
// MQTT bridge

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use serde::{Deserialize, Serialize};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::Mutex;
use tokio::time::{Duration, interval};
use tracing::{debug, error, info, warn};

use radiora2_bridge::{BridgeEvent, Session, SessionConfig};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "radiora2mqtt")]
#[command(about = "Bridge between a Lutron RadioRA2 controller and MQTT")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: String,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Config {
    controller: ControllerToml,
    mqtt: MqttToml,
    #[serde(default, deserialize_with = "deserialize_output_names")]
    output_names: HashMap<u32, String>,
}

fn deserialize_output_names<'de, D>(deserializer: D) -> Result<HashMap<u32, String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let string_map: HashMap<String, String> = HashMap::deserialize(deserializer)?;
    string_map
        .into_iter()
        .map(|(k, v)| {
            k.parse::<u32>()
                .map(|id| (id, v))
                .map_err(|_| serde::de::Error::custom(format!("invalid output ID: {k}")))
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct ControllerToml {
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_username")]
    username: String,
    #[serde(default = "default_password")]
    password: String,
    #[serde(default = "default_reconnect_delay")]
    reconnect_delay_ms: u64,
    #[serde(default = "default_query_timeout")]
    query_timeout_ms: u64,
}

fn default_port() -> u16 {
    23
}
fn default_username() -> String {
    "lutron".to_string()
}
fn default_password() -> String {
    "integration".to_string()
}
fn default_reconnect_delay() -> u64 {
    1000
}
fn default_query_timeout() -> u64 {
    5000
}

#[derive(Debug, Deserialize)]
struct MqttToml {
    url: String,
    #[serde(default = "default_client_id")]
    client_id: String,
    #[serde(default = "default_subscribe_topic")]
    subscribe_topic: String,
    #[serde(default = "default_publish_topic")]
    publish_topic: String,
    #[serde(default = "default_snapshot_interval")]
    snapshot_interval_secs: u64,
}

fn default_client_id() -> String {
    "radiora2-bridge".to_string()
}
fn default_subscribe_topic() -> String {
    "radiora2/cmd".to_string()
}
fn default_publish_topic() -> String {
    "radiora2".to_string()
}
fn default_snapshot_interval() -> u64 {
    60
}

fn build_session_config(toml: &ControllerToml) -> SessionConfig {
    SessionConfig::builder()
        .host(&toml.host)
        .port(toml.port)
        .username(&toml.username)
        .password(&toml.password)
        .reconnect_delay_ms(toml.reconnect_delay_ms)
        .query_timeout_ms(toml.query_timeout_ms)
        .build()
}

// ---------------------------------------------------------------------------
// MQTT JSON types
// ---------------------------------------------------------------------------

// Published messages — all share {now, op, ...} flat structure

#[derive(Serialize)]
struct MqttOutputEvent {
    now: u64,
    op: String,
    id: u32,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    level: Option<u8>,
}

#[derive(Serialize)]
struct MqttButtonEvent {
    now: u64,
    op: String,
    device: u32,
    button: u32,
}

#[derive(Serialize)]
struct MqttGroupEvent {
    now: u64,
    op: String,
    group: u32,
}

#[derive(Serialize)]
struct MqttSimpleEvent {
    now: u64,
    op: String,
}

#[derive(Serialize)]
struct MqttSnapshot {
    now: u64,
    op: String,
    outputs: Vec<MqttOutputState>,
}

#[derive(Serialize)]
struct MqttOutputState {
    id: u32,
    name: String,
    level: u8,
}

// CMD_ACK response
#[derive(Serialize)]
struct MqttCmdAck {
    now: u64,
    op: String,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    src: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
}

// Inbound command (subscribed)
#[derive(Deserialize)]
struct MqttCommand {
    op: String,
    #[serde(default)]
    id: Option<u32>,
    #[serde(default)]
    level: Option<u8>,
    #[serde(default)]
    fade: Option<u32>,
    #[serde(default)]
    delay: Option<u32>,
    #[serde(default)]
    button: Option<u32>,
    #[serde(default)]
    group: Option<u32>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn now_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

fn output_label(id: u32, names: &HashMap<u32, String>) -> String {
    names
        .get(&id)
        .cloned()
        .unwrap_or_else(|| format!("Output {id}"))
}

async fn publish_json(client: &AsyncClient, topic: &str, payload: &impl Serialize, retain: bool) {
    match serde_json::to_string(payload) {
        Ok(json) => {
            if let Err(e) = client.publish(topic, QoS::AtLeastOnce, retain, json).await {
                error!("Failed to publish to {topic}: {e}");
            }
        }
        Err(e) => error!("Failed to serialize MQTT payload: {e}"),
    }
}

async fn publish_output_event(
    client: &AsyncClient,
    topic: &str,
    op: &str,
    id: u32,
    level: Option<u8>,
    names: &HashMap<u32, String>,
) {
    let msg = MqttOutputEvent {
        now: now_epoch_ms(),
        op: op.to_string(),
        id,
        name: output_label(id, names),
        level,
    };
    publish_json(client, topic, &msg, false).await;
}

async fn publish_button_event(
    client: &AsyncClient,
    topic: &str,
    op: &str,
    device: u32,
    button: u32,
) {
    let msg = MqttButtonEvent {
        now: now_epoch_ms(),
        op: op.to_string(),
        device,
        button,
    };
    publish_json(client, topic, &msg, false).await;
}

async fn publish_group_event(client: &AsyncClient, topic: &str, op: &str, group: u32) {
    let msg = MqttGroupEvent {
        now: now_epoch_ms(),
        op: op.to_string(),
        group,
    };
    publish_json(client, topic, &msg, false).await;
}

async fn publish_simple_event(client: &AsyncClient, topic: &str, op: &str) {
    let msg = MqttSimpleEvent {
        now: now_epoch_ms(),
        op: op.to_string(),
    };
    publish_json(client, topic, &msg, false).await;
}

async fn publish_cmd_ack(
    client: &AsyncClient,
    topic: &str,
    success: bool,
    src: Option<serde_json::Value>,
    data: Option<serde_json::Value>,
) {
    let msg = MqttCmdAck {
        now: now_epoch_ms(),
        op: "CMD_ACK".to_string(),
        success,
        src,
        data,
    };
    publish_json(client, topic, &msg, false).await;
}

fn build_snapshot(levels: &HashMap<u32, u8>, names: &HashMap<u32, String>) -> MqttSnapshot {
    let mut outputs: Vec<MqttOutputState> = levels
        .iter()
        .map(|(&id, &level)| MqttOutputState {
            id,
            name: output_label(id, names),
            level,
        })
        .collect();
    outputs.sort_by_key(|o| o.id);

    MqttSnapshot {
        now: now_epoch_ms(),
        op: "SNAPSHOT".to_string(),
        outputs,
    }
}

async fn publish_snapshot(
    client: &AsyncClient,
    topic: &str,
    levels: &HashMap<u32, u8>,
    names: &HashMap<u32, String>,
) {
    let snapshot = build_snapshot(levels, names);
    publish_json(client, topic, &snapshot, true).await;
}

// ---------------------------------------------------------------------------
// Session event → MQTT
// ---------------------------------------------------------------------------

async fn handle_session_event(
    event: BridgeEvent,
    client: &AsyncClient,
    topic: &str,
    levels: &Mutex<HashMap<u32, u8>>,
    names: &HashMap<u32, String>,
) {
    match event {
        BridgeEvent::LoggedIn => {
            info!("Controller session logged in");
            publish_simple_event(client, topic, "LOGGED_IN").await;
        }
        BridgeEvent::Closed(reason) => {
            warn!("Controller connection closed: {reason}");
            publish_simple_event(client, topic, "CONNECTION_CLOSED").await;
        }
        BridgeEvent::On(id) => {
            publish_output_event(client, topic, "OUTPUT_ON", id, None, names).await;
        }
        BridgeEvent::Off(id) => {
            levels.lock().await.insert(id, 0);
            publish_output_event(client, topic, "OUTPUT_OFF", id, None, names).await;
        }
        BridgeEvent::Level { id, level } => {
            levels.lock().await.insert(id, level);
            publish_output_event(client, topic, "OUTPUT_LEVEL", id, Some(level), names).await;
        }
        BridgeEvent::ButtonPress { device, button } => {
            publish_button_event(client, topic, "BUTTON_PRESS", device, button).await;
        }
        BridgeEvent::ButtonReleased { device, button } => {
            publish_button_event(client, topic, "BUTTON_RELEASE", device, button).await;
        }
        BridgeEvent::KeypadLedOn { device, button } => {
            publish_button_event(client, topic, "LED_ON", device, button).await;
        }
        BridgeEvent::KeypadLedOff { device, button } => {
            publish_button_event(client, topic, "LED_OFF", device, button).await;
        }
        BridgeEvent::GroupOccupied(id) => {
            publish_group_event(client, topic, "GROUP_OCCUPIED", id).await;
        }
        BridgeEvent::GroupUnoccupied(id) => {
            publish_group_event(client, topic, "GROUP_UNOCCUPIED", id).await;
        }
        BridgeEvent::GroupUnknown(id) => {
            publish_group_event(client, topic, "GROUP_UNKNOWN", id).await;
        }
        BridgeEvent::Sent(command) => {
            debug!("Command sent: {}", command.trim_end());
        }
        BridgeEvent::Error(text) => {
            error!("Session error: {text}");
        }
        BridgeEvent::Info(text) => {
            info!("{text}");
        }
        BridgeEvent::Debug(text) | BridgeEvent::MessageReceived(text) => {
            debug!("{}", text.trim_end());
        }
        BridgeEvent::OutputStatus { .. } => {
            // Correlation replies; the On/Off/Level events carry the news.
        }
    }
}

// ---------------------------------------------------------------------------
// MQTT command handler
// ---------------------------------------------------------------------------

async fn handle_command(
    payload_str: &str,
    cmd: MqttCommand,
    client: &AsyncClient,
    topic: &str,
    session: &Session,
    levels: &Mutex<HashMap<u32, u8>>,
    names: &HashMap<u32, String>,
) {
    // Parse the raw payload as a JSON value for the CMD_ACK src field
    let src_json = serde_json::from_str::<serde_json::Value>(payload_str).ok();

    // Require an id for the output/button ops
    let require_id = |op: &str| -> Option<u32> {
        if cmd.id.is_none() {
            warn!("{op}: missing id");
        }
        cmd.id
    };

    match cmd.op.as_str() {
        "PING" => {
            info!("Command: PING");
            publish_cmd_ack(client, topic, true, src_json, None).await;
        }

        "SNAPSHOT" => {
            debug!("Command: SNAPSHOT");
            let levels = levels.lock().await;
            let snapshot = build_snapshot(&levels, names);
            let snapshot_value = serde_json::to_value(&snapshot).ok();
            publish_json(client, topic, &snapshot, true).await;
            publish_cmd_ack(client, topic, true, src_json, snapshot_value).await;
        }

        "SET_LEVEL" => {
            let (Some(id), Some(level)) = (require_id("SET_LEVEL"), cmd.level) else {
                publish_cmd_ack(client, topic, false, src_json, None).await;
                return;
            };
            info!("Command: SET_LEVEL output {id} -> {level}");
            let success = session.set_dimmer(id, level, cmd.fade, cmd.delay).is_ok();
            publish_cmd_ack(client, topic, success, src_json, None).await;
        }

        "ON" | "OFF" => {
            let Some(id) = require_id(&cmd.op) else {
                publish_cmd_ack(client, topic, false, src_json, None).await;
                return;
            };
            let on = cmd.op == "ON";
            info!("Command: {} output {id}", cmd.op);
            let success = session.set_switch(id, on).is_ok();
            publish_cmd_ack(client, topic, success, src_json, None).await;
        }

        "PRESS_BUTTON" => {
            let (Some(id), Some(button)) = (require_id("PRESS_BUTTON"), cmd.button) else {
                publish_cmd_ack(client, topic, false, src_json, None).await;
                return;
            };
            info!("Command: PRESS_BUTTON device {id} button {button}");
            let success = session.press_button(id, button).is_ok();
            publish_cmd_ack(client, topic, success, src_json, None).await;
        }

        "QUERY_OUTPUT" => {
            let Some(id) = require_id("QUERY_OUTPUT") else {
                publish_cmd_ack(client, topic, false, src_json, None).await;
                return;
            };
            info!("Command: QUERY_OUTPUT output {id}");
            match session.query_output(id).await {
                Ok(level) => {
                    levels.lock().await.insert(id, level);
                    let data = serde_json::json!({ "id": id, "level": level });
                    publish_cmd_ack(client, topic, true, src_json, Some(data)).await;
                }
                Err(e) => {
                    warn!("QUERY_OUTPUT output {id} failed: {e}");
                    publish_cmd_ack(client, topic, false, src_json, None).await;
                }
            }
        }

        "QUERY_GROUP" => {
            let Some(group) = cmd.group else {
                warn!("QUERY_GROUP: missing group");
                publish_cmd_ack(client, topic, false, src_json, None).await;
                return;
            };
            info!("Command: QUERY_GROUP group {group}");
            let success = session.query_group_state(group).is_ok();
            publish_cmd_ack(client, topic, success, src_json, None).await;
        }

        "QUERY_LED" => {
            let (Some(id), Some(button)) = (require_id("QUERY_LED"), cmd.button) else {
                publish_cmd_ack(client, topic, false, src_json, None).await;
                return;
            };
            info!("Command: QUERY_LED device {id} button {button}");
            let success = session.query_button_state(id, button).is_ok();
            publish_cmd_ack(client, topic, success, src_json, None).await;
        }

        other => {
            warn!("Unknown command: {other}");
            publish_cmd_ack(client, topic, false, src_json, None).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controls verbosity (e.g. RUST_LOG=debug or RUST_LOG=radiora2_bridge=trace).
    // Default: info.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // systemd journal already adds timestamps, so omit them when running under systemd
    if std::env::var_os("JOURNAL_STREAM").is_some() {
        tracing_subscriber::fmt()
            .without_time()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let cli = Cli::parse();

    let mut config = load_config(&cli.config)?;
    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    loop {
        let (mqtt_host, mqtt_port) = parse_mqtt_url(&config.mqtt.url)?;
        let publish_topic = config.mqtt.publish_topic.clone();
        let subscribe_topic = config.mqtt.subscribe_topic.clone();
        let names = Arc::new(config.output_names.clone());
        let levels = Arc::new(Mutex::new(HashMap::<u32, u8>::new()));

        info!(
            "Connecting to controller at {}:{}",
            config.controller.host, config.controller.port
        );
        let session = Arc::new(Session::connect(build_session_config(&config.controller)));

        // Set up MQTT
        let mut mqtt_opts = MqttOptions::new(&config.mqtt.client_id, &mqtt_host, mqtt_port);
        mqtt_opts.set_keep_alive(Duration::from_secs(30));
        let (client, mut eventloop) = AsyncClient::new(mqtt_opts, 256);

        client
            .subscribe(&subscribe_topic, QoS::AtLeastOnce)
            .await
            .context("Failed to subscribe to MQTT topic")?;
        info!("MQTT: subscribed to {subscribe_topic}");

        // Task 1: Session event listener
        let client_events = client.clone();
        let topic_events = publish_topic.clone();
        let levels_events = Arc::clone(&levels);
        let names_events = Arc::clone(&names);
        let mut event_rx = session.subscribe();
        let event_handle = tokio::spawn(async move {
            loop {
                match event_rx.recv().await {
                    Ok(event) => {
                        handle_session_event(
                            event,
                            &client_events,
                            &topic_events,
                            &levels_events,
                            &names_events,
                        )
                        .await;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Event receiver lagged, missed {n} events");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        info!("Event channel closed");
                        break;
                    }
                }
            }
        });

        // Task 2: MQTT event loop (receives messages, handles commands)
        let session_cmds = Arc::clone(&session);
        let client_cmds = client.clone();
        let topic_cmds = publish_topic.clone();
        let levels_cmds = Arc::clone(&levels);
        let names_cmds = Arc::clone(&names);
        let sub_topic = subscribe_topic.clone();
        let mqtt_handle = tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        // (Re)subscribe after every broker connect/reconnect.
                        // rumqttc does not auto-resubscribe, so without this a
                        // broker restart silently drops our subscription and we
                        // stop receiving commands.
                        info!("MQTT: connected, subscribing to {sub_topic}");
                        if let Err(e) = client_cmds.subscribe(&sub_topic, QoS::AtLeastOnce).await {
                            error!("Failed to subscribe to {sub_topic}: {e}");
                        }
                    }
                    Ok(Event::Incoming(Packet::Publish(msg))) => {
                        if msg.topic == sub_topic {
                            let payload = String::from_utf8_lossy(&msg.payload);
                            match serde_json::from_str::<MqttCommand>(&payload) {
                                Ok(cmd) => {
                                    info!("MQTT command received: {payload}");
                                    handle_command(
                                        &payload,
                                        cmd,
                                        &client_cmds,
                                        &topic_cmds,
                                        &session_cmds,
                                        &levels_cmds,
                                        &names_cmds,
                                    )
                                    .await;
                                }
                                Err(e) => {
                                    warn!("Failed to parse MQTT command: {e}");
                                }
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("MQTT event loop error: {e}");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        // Task 3: Snapshot timer — publishes the level cache periodically
        let client_snap = client.clone();
        let topic_snap = publish_topic.clone();
        let levels_snap = Arc::clone(&levels);
        let names_snap = Arc::clone(&names);
        let snapshot_interval = config.mqtt.snapshot_interval_secs;
        let snap_handle = tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(snapshot_interval));
            // Skip the first immediate tick; the cache is still empty
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let levels = levels_snap.lock().await;
                publish_snapshot(&client_snap, &topic_snap, &levels, &names_snap).await;
            }
        });

        // Wait for a signal
        info!("MQTT bridge running. Send SIGHUP to restart, SIGINT/SIGTERM to stop.");
        let restart = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, shutting down...");
                false
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
                false
            }
            _ = sighup.recv() => {
                info!("Received SIGHUP, reloading config and restarting connections...");
                true
            }
        };

        // Abort tasks and wait for them to release their Session references
        event_handle.abort();
        mqtt_handle.abort();
        snap_handle.abort();
        let _ = event_handle.await;
        let _ = mqtt_handle.await;
        let _ = snap_handle.await;

        // Disconnect session
        match Arc::try_unwrap(session) {
            Ok(session) => session.disconnect().await,
            Err(_arc) => {
                warn!("Could not unwrap session Arc for clean disconnect (tasks still hold references)");
            }
        }

        if !restart {
            break;
        }

        // Reload config from disk; keep previous config on failure
        info!("Reloading config from {}", cli.config);
        match load_config(&cli.config) {
            Ok(new_config) => {
                config = new_config;
                info!("Config reloaded successfully");
            }
            Err(e) => warn!("Failed to reload config, keeping previous: {e}"),
        }

        info!("Reconnecting...");
    }

    info!("Shutdown complete");
    Ok(())
}

fn load_config(path: &str) -> Result<Config> {
    let text = std::fs::read_to_string(path).context("Failed to read config file")?;
    toml::from_str(&text).context("Failed to parse config file")
}

/// Parse an MQTT URL like "mqtt://host:port" into (host, port).
fn parse_mqtt_url(url: &str) -> Result<(String, u16)> {
    let stripped = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url);

    let (host, port_str) = stripped
        .rsplit_once(':')
        .context("MQTT URL must be in format mqtt://host:port")?;

    let port: u16 = port_str.parse().context("Invalid MQTT port number")?;

    Ok((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mqtt_url() {
        assert_eq!(
            parse_mqtt_url("mqtt://broker.local:1883").unwrap(),
            ("broker.local".to_string(), 1883)
        );
        assert_eq!(
            parse_mqtt_url("tcp://10.0.0.5:1884").unwrap(),
            ("10.0.0.5".to_string(), 1884)
        );
        assert_eq!(
            parse_mqtt_url("broker.local:1883").unwrap(),
            ("broker.local".to_string(), 1883)
        );
        assert!(parse_mqtt_url("broker.local").is_err());
        assert!(parse_mqtt_url("mqtt://broker.local:notaport").is_err());
    }

    #[test]
    fn test_config_minimal_toml() {
        let config: Config = toml::from_str(
            r#"
            [controller]
            host = "192.168.1.50"

            [mqtt]
            url = "mqtt://broker.local:1883"
            "#,
        )
        .unwrap();

        assert_eq!(config.controller.port, 23);
        assert_eq!(config.controller.username, "lutron");
        assert_eq!(config.mqtt.subscribe_topic, "radiora2/cmd");
        assert_eq!(config.mqtt.snapshot_interval_secs, 60);
        assert!(config.output_names.is_empty());
    }

    #[test]
    fn test_config_output_names() {
        let config: Config = toml::from_str(
            r#"
            [controller]
            host = "192.168.1.50"

            [mqtt]
            url = "mqtt://broker.local:1883"

            [output_names]
            12 = "Kitchen"
            14 = "Hallway"
            "#,
        )
        .unwrap();

        assert_eq!(config.output_names.get(&12).unwrap(), "Kitchen");
        assert_eq!(config.output_names.get(&14).unwrap(), "Hallway");
    }

    #[test]
    fn test_config_bad_output_name_key() {
        let result: std::result::Result<Config, _> = toml::from_str(
            r#"
            [controller]
            host = "192.168.1.50"

            [mqtt]
            url = "mqtt://broker.local:1883"

            [output_names]
            kitchen = "Kitchen"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_output_label_fallback() {
        let mut names = HashMap::new();
        names.insert(12, "Kitchen".to_string());
        assert_eq!(output_label(12, &names), "Kitchen");
        assert_eq!(output_label(31, &names), "Output 31");
    }

    #[test]
    fn test_output_event_json_shape() {
        let msg = MqttOutputEvent {
            now: 1756100000000,
            op: "OUTPUT_LEVEL".to_string(),
            id: 12,
            name: "Kitchen".to_string(),
            level: Some(75),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["op"], "OUTPUT_LEVEL");
        assert_eq!(value["level"], 75);

        // level is omitted entirely for ON/OFF events
        let msg = MqttOutputEvent {
            now: 1756100000000,
            op: "OUTPUT_ON".to_string(),
            id: 12,
            name: "Kitchen".to_string(),
            level: None,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert!(value.get("level").is_none());
    }

    #[test]
    fn test_snapshot_sorted_by_id() {
        let mut levels = HashMap::new();
        levels.insert(14, 0u8);
        levels.insert(3, 75u8);
        levels.insert(12, 50u8);
        let snapshot = build_snapshot(&levels, &HashMap::new());
        let ids: Vec<u32> = snapshot.outputs.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![3, 12, 14]);
    }
}
