pub mod auth;
pub mod config;
pub mod observer;
pub mod server;

use std::sync::Arc;
use std::time::Duration;

use config::Config;
use service::clock::SystemClock;
use service::{Service, ServiceOptions};

use auth::StaticCredentials;
use observer::Observer;
use server::{ClientSink, Reactor};

/// Build the service from `config` and run every configured interface's
/// reactor until the process is killed.
pub async fn startup(config: Config) -> anyhow::Result<()> {
    let credentials = Arc::new(StaticCredentials::new(
        config.server.realm.clone(),
        config.auth.static_credentials.clone(),
    ));

    let write_deadline = Duration::from_millis(config.server.write_deadline_millis);
    let collect_interval = Duration::from_secs(config.server.collect_interval_secs);

    let sink = ClientSink::new(write_deadline);
    let clock: Arc<dyn service::clock::Clock> = Arc::new(SystemClock);

    let service = Service::new(
        ServiceOptions {
            realm: config.server.realm.clone(),
            software: config.server.software.clone(),
            interfaces: config.server.interfaces.clone(),
            port_range: config.server.port_range,
            credentials,
            handler: Observer,
            default_permission_lifetime_secs: config.server.default_permission_lifetime_secs,
            max_permission_lifetime_secs: config.server.max_permission_lifetime_secs,
        },
        clock.clone(),
        Arc::new(sink.clone()),
    );

    let mut tasks = Vec::new();
    for interface in config.server.interfaces.iter().copied() {
        let reactor = Reactor::bind(
            interface,
            &service,
            &sink,
            clock.clone(),
            config.server.read_buffer,
            write_deadline,
            collect_interval,
        )
        .await?;
        log::info!("listening on {}", interface);
        tasks.push(tokio::spawn(reactor.run()));
    }

    for task in tasks {
        task.await?;
    }

    Ok(())
}
