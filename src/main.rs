use clap::Parser;
use mqtt_discoverystream::bridge::Bridge;
use mqtt_discoverystream::config::Config;
use mqtt_discoverystream::consts;
use mqtt_discoverystream::filter::EntityFilter;
use mqtt_discoverystream::hub::{EventReader, LineInvoker};
use mqtt_discoverystream::mqtt::{Inbound, Initiator};
use mqtt_discoverystream::registry::StaticRegistry;
use mqtt_discoverystream::tracker::DiscoveryRegistry;
use tokio::io::BufReader;
use tracing::{error, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value = "config.yaml")]
    config_path: String,

    // MQTT connection
    #[arg(long)]
    mqtt_host: String,
    #[arg(long, default_value_t = 1883)]
    mqtt_port: u16,
    #[arg(long, default_value = "")]
    mqtt_username: String,
    #[arg(long, default_value = "")]
    mqtt_password: String,
    #[arg(long, default_value = consts::BRIDGE_NAME)]
    client_id: String,
}

fn init_log() -> anyhow::Result<()> {
    let timer = fmt::time::ChronoLocal::new("%H:%M:%S%.3f".to_string());

    // Configure a custom event formatter
    let format = fmt::format()
        .with_level(true)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_source_location(true)
        .with_timer(timer)
        .compact();

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::DEBUG.into())
        .from_env()?
        .add_directive("rumqttc=info".parse()?);

    // stdout belongs to the hub link.
    fmt()
        .event_format(format)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_log()?;
    let args = Args::parse();

    let config = Config::from_file(&args.config_path)?;
    info!(
        "Starting {} {}. Args: {:?} Config: {:?}",
        consts::BRIDGE_NAME,
        consts::BRIDGE_VERSION,
        args,
        config
    );

    let initiator = Initiator::new(
        &args.client_id,
        &args.mqtt_host,
        args.mqtt_port,
        &args.mqtt_username,
        &args.mqtt_password,
    )
    .await?;
    let (transport, mut inbound) = initiator.start();

    let topics = config.topics();
    let filter = EntityFilter::new(&config.include, &config.exclude);
    let registry = StaticRegistry::new(config.registry.entities, config.registry.devices);
    let bridge = Bridge::new(
        topics,
        filter,
        &DiscoveryRegistry::new(),
        registry,
        transport,
        LineInvoker::new(tokio::io::stdout()),
    );
    bridge.setup().await?;

    info!("{} initialized.", consts::BRIDGE_NAME);

    // Hub -> MQTT
    let task_hub_to_mqtt = async {
        let mut events = EventReader::new(BufReader::new(tokio::io::stdin()));
        loop {
            let event = match events.next().await {
                Ok(Some(event)) => event,
                Ok(None) => break,
                Err(err) => {
                    error!("Reading hub events failed: {:?}", err);
                    break;
                }
            };
            if let Err(err) = bridge
                .on_state_change(&event.entity_id, event.new_state.as_ref())
                .await
            {
                error!("Publishing state of {} failed: {:?}", event.entity_id, err);
            }
        }
        info!("Hub->MQTT task finishing");
        Err::<(), ()>(())
    };

    // MQTT -> Hub
    let task_mqtt_to_hub = async {
        while let Some(event) = inbound.recv().await {
            match event {
                Inbound::Message(msg) => {
                    if let Err(err) = bridge.on_command(&msg.topic, &msg.payload).await {
                        error!("Handling command on {} failed: {:?}", msg.topic, err);
                    }
                }
                Inbound::Reconnected => {
                    if let Err(err) = bridge.on_reconnect().await {
                        error!("Restoring subscriptions failed: {:?}", err);
                    }
                }
            }
        }
        // Return Err to break try_join
        info!("MQTT->Hub task finishing");
        Err::<(), ()>(())
    };

    // If either side dies this should close the program.
    let _ = tokio::try_join!(task_mqtt_to_hub, task_hub_to_mqtt);
    Ok(())
}
