//! Grant platform collaborator.
//!
//! This module defines the `GrantClient` trait to abstract the downstream
//! grant platforms, enabling testability with mock implementations. The
//! production system would talk to the real platforms; this service only
//! ever ships with the mock.

use async_trait::async_trait;

use crate::domain::grant::{PlanId, PlatformType};
use crate::domain::recipient::{Recipient, RecipientType};
use crate::error::Result;

/// Outcome of one successful grant cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrantReceipt {
    /// Value issued to the recipient, in minor currency units
    pub amount: i64,
    /// Platform that issued the grant
    pub platform: PlatformType,
}

/// Trait for issuing grants against a downstream platform.
///
/// Latency and success/failure are collaborator-controlled; the core treats
/// any error as "cycle not issued" and moves on.
#[async_trait]
pub trait GrantClient: Send + Sync + Clone {
    /// Issue one grant cycle to a recipient.
    async fn issue_grant(&self, recipient: &Recipient, plan_id: PlanId) -> Result<GrantReceipt>;

    /// Resolve how many grant cycles one recipient visit consumes from the
    /// batch total.
    async fn plan_unit_size(&self, plan_id: PlanId) -> Result<i32>;
}

// ============================================================================
// Mock Implementation
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Record of a call made to the mock grant client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockGrantCall {
    pub recipient_id: crate::domain::recipient::RecipientId,
    pub plan_id: PlanId,
}

/// Mock grant client simulating the two downstream platforms.
///
/// Platform A answers in 10-30ms with amounts of 100-999; platform B in
/// 15-40ms with amounts of 200-999. Plan unit sizes resolve to 3-7. All of
/// it can be pinned for tests: seed the RNG, fix the unit size or amount,
/// disable latency, or inject a failure rate.
#[derive(Clone)]
pub struct MockGrantClient {
    rng: Arc<Mutex<StdRng>>,
    failure_rate: f64,
    fixed_unit_size: Option<i32>,
    fixed_amount: Option<i64>,
    latency: bool,
    calls: Arc<Mutex<Vec<MockGrantCall>>>,
    in_flight: Arc<AtomicUsize>,
}

impl MockGrantClient {
    pub fn new() -> Self {
        Self::with_seed(rand::random())
    }

    /// Create a client with a deterministic RNG seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Arc::new(Mutex::new(StdRng::seed_from_u64(seed))),
            failure_rate: 0.0,
            fixed_unit_size: None,
            fixed_amount: None,
            latency: true,
            calls: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fraction of grant calls that fail, 0.0 to 1.0.
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = rate;
        self
    }

    /// Pin `plan_unit_size` to a fixed value instead of the random 3-7.
    pub fn with_unit_size(mut self, unit_size: i32) -> Self {
        self.fixed_unit_size = Some(unit_size);
        self
    }

    /// Pin grant amounts to a fixed value.
    pub fn with_amount(mut self, amount: i64) -> Self {
        self.fixed_amount = Some(amount);
        self
    }

    /// Disable the synthetic per-call latency.
    pub fn without_latency(mut self) -> Self {
        self.latency = false;
        self
    }

    /// Get all calls that have been made to this mock client.
    pub fn get_calls(&self) -> Vec<MockGrantCall> {
        self.calls.lock().clone()
    }

    /// Get the number of grant calls made.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Get the number of grant calls currently executing.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

impl Default for MockGrantClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GrantClient for MockGrantClient {
    async fn issue_grant(&self, recipient: &Recipient, plan_id: PlanId) -> Result<GrantReceipt> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let in_flight = self.in_flight.clone();
        let _guard = scopeguard::guard((), move |_| {
            in_flight.fetch_sub(1, Ordering::SeqCst);
        });

        self.calls.lock().push(MockGrantCall {
            recipient_id: recipient.id,
            plan_id,
        });

        // Sample everything up front so the RNG lock is never held across
        // the latency sleep.
        let (delay_ms, amount, fail) = {
            let mut rng = self.rng.lock();
            let (delay_ms, amount) = match recipient.recipient_type {
                RecipientType::PlatformA => (10 + rng.gen_range(0..20), 100 + rng.gen_range(0..900)),
                RecipientType::PlatformB => (15 + rng.gen_range(0..25), 200 + rng.gen_range(0..800)),
            };
            let fail = self.failure_rate > 0.0 && rng.gen_bool(self.failure_rate.min(1.0));
            (delay_ms, amount, fail)
        };

        if self.latency {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        if fail {
            tracing::debug!(
                recipient_id = %recipient.id,
                plan_id = %plan_id,
                "mock platform rejected grant"
            );
            return Err(anyhow::anyhow!(
                "grant platform rejected grant for recipient {}",
                recipient.id
            )
            .into());
        }

        let platform = match recipient.recipient_type {
            RecipientType::PlatformA => PlatformType::A,
            RecipientType::PlatformB => PlatformType::B,
        };

        Ok(GrantReceipt {
            amount: self.fixed_amount.unwrap_or(amount),
            platform,
        })
    }

    async fn plan_unit_size(&self, plan_id: PlanId) -> Result<i32> {
        tracing::debug!(plan_id = %plan_id, "mock plan unit size lookup");
        if let Some(unit_size) = self.fixed_unit_size {
            return Ok(unit_size);
        }
        Ok(3 + self.rng.lock().gen_range(0..5))
    }
}
