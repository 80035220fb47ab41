use std::fmt::Debug;
use std::fmt::Display;

use gateway_core::configuration::get_configuration;
use gateway_core::telemetry::get_subscriber;
use gateway_core::telemetry::init_subscriber;
use gateway_core::workers::init_notification_worker;
use gateway_core::workers::init_poll_worker;
use gateway_core::workers::init_refund_worker;
use tokio::task::JoinError;

fn report_exit(
    name: &str,
    outcome: Result<Result<(), impl Debug + Display>, JoinError>,
) {
    match outcome {
        Ok(Ok(())) => {
            tracing::info!("{name} exited gracefully")
        }

        Ok(Err(e)) => {
            tracing::error!(
                error.cause_chain=?e,
                error.message=%e,
                "{name} failed (inner)"
            )
        }

        Err(e) => {
            tracing::error!(
                error.cause_chain=?e,
                error.message=%e,
                "{name} failed (outer)"
            )
        }
    }
}

/// Load config, start telemetry, and run the three background workers as a
/// single cancellable task group. There is no HTTP server here — admission
/// is a separate deployable that shares this crate's schema.
#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenvy::dotenv().ok();

    let subscriber = get_subscriber("gateway-core", "info", std::io::stdout);
    init_subscriber(subscriber);

    let cfg = get_configuration().expect("failed to read configuration");

    let poll_worker = tokio::spawn(init_poll_worker(cfg.clone()));
    let refund_worker = tokio::spawn(init_refund_worker(cfg.clone()));
    let notification_worker = tokio::spawn(init_notification_worker(cfg));

    // The only fatal boot condition is a broker connection failure inside one
    // of the workers; everything else is caught and logged at the claim
    // boundary, so the loops never exit on their own.
    tokio::select! {
        o = poll_worker => { report_exit("Polling worker", o) },
        o = refund_worker => { report_exit("Refund worker", o) },
        o = notification_worker => { report_exit("Notification worker", o) },
    }

    Ok(())
}
