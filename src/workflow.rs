//! Deprovision workflow: log in, find the instance, delete it, and wait for
//! it to drop out of the organization's instance listing.

use crate::nuve::{Account, Credentials, DeprovisionError, Instance, NuvePlatform, Session};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct DeprovisionRequest {
    pub credentials: Credentials,
    pub instance_name: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeprovisionOutcome {
    pub instance_id: u64,
    /// Listings fetched after the delete call.
    pub polls: u32,
    pub waited: Duration,
}

pub struct Deprovisioner<'a, P: NuvePlatform + ?Sized> {
    platform: &'a P,
    poll_interval: Duration,
}

impl<'a, P: NuvePlatform + ?Sized> Deprovisioner<'a, P> {
    pub fn new(platform: &'a P) -> Self {
        Self {
            platform,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub async fn run(
        &self,
        request: &DeprovisionRequest,
    ) -> Result<DeprovisionOutcome, DeprovisionError> {
        let session = self.platform.login(&request.credentials).await?;

        let account = self.platform.check_identity(&session).await?;
        println!("Logged in as {}.", account.name);
        debug!(account.slug = %account.slug, "Resolved account");

        let instances = self.platform.list_instances(&session, &account).await?;
        let instance = select_instance(&instances, &request.instance_name)?;
        let instance_id = instance.id;
        info!(
            instance.id = instance_id,
            instance.status = %instance.status,
            "Requesting instance deletion"
        );

        self.platform
            .delete_instance(&session, &account, instance_id)
            .await?;

        self.await_termination(&session, &account, instance_id, &instances, request.timeout)
            .await
    }

    /// Poll the listing until `instance_id` is gone.
    ///
    /// The deadline only decides whether a listing that still shows the
    /// instance is fatal; a listing is always fetched after each sleep, so a
    /// timeout is never reported from a listing older than one interval.
    async fn await_termination(
        &self,
        session: &Session,
        account: &Account,
        instance_id: u64,
        last_listing: &[Instance],
        timeout: Duration,
    ) -> Result<DeprovisionOutcome, DeprovisionError> {
        let started = Instant::now();
        // None when the deadline is past what the clock can represent.
        let deadline = started.checked_add(timeout);
        let deadline_at = chrono::Duration::from_std(timeout)
            .ok()
            .and_then(|d| chrono::Utc::now().checked_add_signed(d));
        if let Some(at) = deadline_at {
            debug!("Timeout date: {}", at.to_rfc3339());
        }

        let mut polls = 0;
        let mut present = contains(last_listing, instance_id);
        while present {
            println!("Waiting for instance to shutdown...");
            sleep(self.poll_interval).await;
            let within_deadline = deadline.map_or(true, |deadline| Instant::now() <= deadline);

            let listing = self.platform.list_instances(session, account).await?;
            polls += 1;
            present = contains(&listing, instance_id);
            debug!(polls, present, within_deadline, "Polled instance listing");

            if present && !within_deadline {
                return Err(DeprovisionError::ShutdownTimeout {
                    timeout_seconds: timeout.as_secs(),
                });
            }
        }

        Ok(DeprovisionOutcome {
            instance_id,
            polls,
            waited: started.elapsed(),
        })
    }
}

fn contains(instances: &[Instance], instance_id: u64) -> bool {
    instances.iter().any(|instance| instance.id == instance_id)
}

/// Exact name match; with duplicates the first in listing order wins.
pub fn select_instance<'i>(
    instances: &'i [Instance],
    name: &str,
) -> Result<&'i Instance, DeprovisionError> {
    let mut matches = instances.iter().filter(|instance| instance.name == name);
    let first = matches
        .next()
        .ok_or_else(|| DeprovisionError::InstanceNotFound {
            name: name.to_string(),
        })?;

    let extra = matches.count();
    if extra > 0 {
        warn!(
            instance.name = name,
            matches = extra + 1,
            instance.id = first.id,
            "Several instances share this name, using the first one listed"
        );
    }
    Ok(first)
}
