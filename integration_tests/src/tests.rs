//! Hardware test cases.
//!
//! Each check builds on the previous one, so the run stops at the first
//! failure. The connection is always released at the end.

use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use colored::Colorize;
use futures::StreamExt;
use tokio::time::timeout;
use uuid::Uuid;

use notify_probe::session::render_payload;
use notify_probe::transport::{
    BleLink, BleTransport, BtleplugLink, BtleplugTransport, CharacteristicInfo, NotificationStream,
    PeripheralAddress, ServiceInfo,
};

/// Peripheral under test and what it is expected to expose.
pub struct Target {
    pub address: PeripheralAddress,
    pub service: Uuid,
    pub characteristic: Uuid,
    pub connect_timeout: Duration,
    pub notify_timeout: Duration,
    pub samples: usize,
}

/// Checks in the order they run. A failure skips everything after it
/// except the release check.
const CHECK_COUNT: usize = 7;

/// Outcome of one hardware check
pub struct CheckResult {
    pub name: &'static str,
    /// Failure reason, `None` when the check passed
    pub failure: Option<String>,
}

impl CheckResult {
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

/// Passed, failed and skipped check counts
fn tally(results: &[CheckResult]) -> (usize, usize, usize) {
    let passed = results.iter().filter(|r| r.passed()).count();
    let failed = results.len() - passed;
    (passed, failed, CHECK_COUNT.saturating_sub(results.len()))
}

/// Print the test name before it runs.
fn start(name: &str) {
    print!("  {} ... ", name);
    std::io::Write::flush(&mut std::io::stdout()).ok();
}

/// Print and record the outcome, handing back the value on success.
fn finish<T>(results: &mut Vec<CheckResult>, name: &'static str, outcome: Result<T>) -> Option<T> {
    match outcome {
        Ok(value) => {
            println!("{}", "PASS".green().bold());
            results.push(CheckResult { name, failure: None });
            Some(value)
        }
        Err(e) => {
            let message = format!("{:#}", e);
            println!("{}", "FAIL".red().bold());
            println!("    {}", message.red());
            results.push(CheckResult {
                name,
                failure: Some(message),
            });
            None
        }
    }
}

/// Run all tests and return results.
pub async fn run_all_tests(transport: &mut BtleplugTransport, target: &Target) -> Vec<CheckResult> {
    let mut results = Vec::new();

    let name = "Peripheral accepts connection";
    start(name);
    let Some(mut link) = finish(&mut results, name, test_connect(transport, target).await) else {
        return results;
    };

    run_connected(&mut link, target, &mut results).await;

    let name = "Connection releases cleanly";
    start(name);
    finish(&mut results, name, link.disconnect().await.map_err(anyhow::Error::from));

    results
}

async fn run_connected(link: &mut BtleplugLink, target: &Target, results: &mut Vec<CheckResult>) {
    let name = "Service discovery succeeds";
    start(name);
    let Some(services) = finish(results, name, test_discover(link, target).await) else {
        return;
    };

    let name = "Sensor service is advertised";
    start(name);
    let Some(service) = finish(results, name, test_service_present(&services, target)) else {
        return;
    };

    let name = "Sensor characteristic supports notify";
    start(name);
    let Some(characteristic) = finish(results, name, test_characteristic_notifies(&service, target))
    else {
        return;
    };

    let name = "First notification arrives";
    start(name);
    let Some((mut stream, first_len)) = finish(
        results,
        name,
        test_first_notification(link, &characteristic, target).await,
    ) else {
        return;
    };

    let name = "Notifications keep arriving";
    start(name);
    finish(
        results,
        name,
        test_notifications_continue(&mut stream, first_len, target).await,
    );
}

/// Print the per-check verdicts for this peripheral
pub fn print_results(target: &Target, results: &[CheckResult]) {
    println!("\n{}", "=".repeat(60));
    println!("{} {}", "Notify checks for".bold(), target.address.to_string().bold());
    println!("  service        {}", target.service);
    println!("  characteristic {}", target.characteristic);
    println!("  samples        {} within {:?}", target.samples, target.notify_timeout);
    println!("{}", "=".repeat(60));

    for result in results {
        match &result.failure {
            None => println!("  {} {}", "[PASS]".green().bold(), result.name),
            Some(reason) => {
                println!("  {} {}", "[FAIL]".red().bold(), result.name);
                println!("         {}", reason.red());
            }
        }
    }

    let (passed, failed, skipped) = tally(results);
    println!("{}", "-".repeat(60));
    println!(
        "  {} passed, {} failed, {} skipped",
        passed.to_string().green(),
        if failed > 0 {
            failed.to_string().red()
        } else {
            failed.to_string().normal()
        },
        skipped.to_string().yellow()
    );
    println!("{}", "=".repeat(60));
}

// --- Individual Tests ---

async fn test_connect(transport: &mut BtleplugTransport, target: &Target) -> Result<BtleplugLink> {
    match timeout(target.connect_timeout, transport.connect(target.address)).await {
        Ok(link) => Ok(link?),
        Err(_) => bail!("{} not found within {:?}", target.address, target.connect_timeout),
    }
}

async fn test_discover(link: &mut BtleplugLink, target: &Target) -> Result<Vec<ServiceInfo>> {
    let services = match timeout(target.connect_timeout, link.discover_services()).await {
        Ok(services) => services?,
        Err(_) => bail!("Discovery did not finish within {:?}", target.connect_timeout),
    };

    if services.is_empty() {
        bail!("Peripheral exposes no services");
    }

    print!("({} services) ", services.len());
    Ok(services)
}

fn test_service_present(services: &[ServiceInfo], target: &Target) -> Result<ServiceInfo> {
    let mut matches = services.iter().filter(|s| s.uuid == target.service);
    let service = matches
        .next()
        .cloned()
        .ok_or_else(|| anyhow!("Service {} not advertised", target.service))?;

    if matches.next().is_some() {
        bail!("Service {} advertised more than once", target.service);
    }

    Ok(service)
}

fn test_characteristic_notifies(service: &ServiceInfo, target: &Target) -> Result<CharacteristicInfo> {
    let characteristic = service
        .characteristics
        .iter()
        .find(|c| c.uuid == target.characteristic)
        .cloned()
        .ok_or_else(|| anyhow!("Characteristic {} not in service", target.characteristic))?;

    if !characteristic.properties.can_notify() {
        bail!(
            "Characteristic {} has properties {:?}",
            characteristic.uuid,
            characteristic.properties
        );
    }

    Ok(characteristic)
}

async fn test_first_notification(
    link: &mut BtleplugLink,
    characteristic: &CharacteristicInfo,
    target: &Target,
) -> Result<(NotificationStream, usize)> {
    let mut stream = link.subscribe(characteristic).await?;

    match timeout(target.notify_timeout, stream.next()).await {
        Ok(Some(notification)) => {
            print!("({}) ", render_payload(&notification.value));
            let len = notification.value.len();
            Ok((stream, len))
        }
        Ok(None) => bail!("Notification stream closed before any value arrived"),
        Err(_) => bail!("No notification within {:?}", target.notify_timeout),
    }
}

async fn test_notifications_continue(
    stream: &mut NotificationStream,
    expected_len: usize,
    target: &Target,
) -> Result<()> {
    for i in 0..target.samples {
        let notification = match timeout(target.notify_timeout, stream.next()).await {
            Ok(Some(notification)) => notification,
            Ok(None) => bail!("Stream closed after {} of {} samples", i, target.samples),
            Err(_) => bail!("Sample {} did not arrive within {:?}", i + 1, target.notify_timeout),
        };

        if notification.characteristic != target.characteristic {
            bail!("Sample {} came from {}", i + 1, notification.characteristic);
        }
        if notification.value.len() != expected_len {
            bail!(
                "Sample {} is {} bytes, first was {}",
                i + 1,
                notification.value.len(),
                expected_len
            );
        }
    }

    print!("({} samples) ", target.samples);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pass(name: &'static str) -> CheckResult {
        CheckResult { name, failure: None }
    }

    #[test]
    fn test_tally_counts_skipped_checks() {
        let results = vec![
            pass("Peripheral accepts connection"),
            pass("Service discovery succeeds"),
            CheckResult {
                name: "Sensor service is advertised",
                failure: Some("service not found".to_string()),
            },
            pass("Connection releases cleanly"),
        ];

        assert_eq!(tally(&results), (3, 1, 3));
    }

    #[test]
    fn test_tally_all_passed() {
        let results: Vec<CheckResult> = (0..CHECK_COUNT).map(|_| pass("check")).collect();

        assert_eq!(tally(&results), (CHECK_COUNT, 0, 0));
    }
}
