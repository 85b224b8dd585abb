//! Badge issuance service.

use std::sync::Arc;

use serde_json::json;

use crate::criteria::{evaluate, validate_criteria, LearnerHistory};
use crate::crypto::{ids::prefixed_id, random};
use crate::error::{ProgressionError, Result};
use crate::ledger::{EventLedger, LedgerEvent, LedgerEventKind, SubjectKind};
use crate::progress::{ActivityId, ActivityKind, ActivityOutcome, LearnerId, ProgressAggregator};
use crate::store::ProgressionStore;

use super::types::*;

// ---------------------------------------------------------------------------
// Definition validation
// ---------------------------------------------------------------------------

/// Validate a badge definition when it is authored.
pub fn validate_badge_definition(definition: &BadgeDefinition) -> Result<()> {
    if definition.id.0.trim().is_empty() {
        return Err(ProgressionError::InvalidDefinition(
            "badge definition id is empty".into(),
        ));
    }
    if definition.name.trim().is_empty() {
        return Err(ProgressionError::InvalidDefinition(format!(
            "badge definition {} has no name",
            definition.id
        )));
    }
    if definition.expiry_days == Some(0) {
        return Err(ProgressionError::InvalidDefinition(format!(
            "badge definition {} expires after 0 days",
            definition.id
        )));
    }
    validate_criteria(&definition.criteria)
}

// ---------------------------------------------------------------------------
// Issuer
// ---------------------------------------------------------------------------

/// Evaluates badge definitions and issues badges.
pub struct BadgeIssuer {
    store: Arc<dyn ProgressionStore>,
    aggregator: Arc<ProgressAggregator>,
}

impl BadgeIssuer {
    /// Create an issuer reading learner history through `aggregator`.
    pub fn new(store: Arc<dyn ProgressionStore>, aggregator: Arc<ProgressAggregator>) -> Self {
        Self { store, aggregator }
    }

    /// Evaluate every active definition compatible with `kind` against the
    /// stored outcome of `activity` and issue the badges it earns.
    ///
    /// Returns the IDs of badges newly issued by this call; replaying the
    /// same activity returns an empty list. A definition that fails to
    /// evaluate or issue is logged and skipped.
    pub fn on_activity_completed(
        &self,
        learner: &LearnerId,
        kind: ActivityKind,
        activity: &ActivityId,
        ledger: &EventLedger,
    ) -> Result<Vec<BadgeId>> {
        let outcome = self.store.outcome(learner, activity)?.ok_or_else(|| {
            ProgressionError::NotFound(format!("outcome of {activity} for {learner}"))
        })?;
        if outcome.kind != kind {
            log::warn!(
                "activity {activity} reported as {} but stored as {}",
                kind.as_tag(),
                outcome.kind.as_tag()
            );
        }
        let history = self.aggregator.history(learner)?;

        let definitions: Vec<BadgeDefinition> = self
            .store
            .badge_definitions()?
            .into_iter()
            .filter(|d| d.active && d.criteria.compatible_with(kind))
            .collect();

        let mut issued = Vec::new();
        for definition in &definitions {
            match self.try_issue(definition, &outcome, &history, ledger) {
                Ok(Some(id)) => issued.push(id),
                Ok(None) => {}
                Err(e) => log::error!(
                    "badge definition {} skipped for {learner}: {e}",
                    definition.id
                ),
            }
        }
        Ok(issued)
    }

    fn try_issue(
        &self,
        definition: &BadgeDefinition,
        outcome: &ActivityOutcome,
        history: &LearnerHistory,
        ledger: &EventLedger,
    ) -> Result<Option<BadgeId>> {
        let learner = &outcome.learner;
        let now = crate::time::now_micros();

        if let Some(held) = self.store.active_badge(learner, &definition.id)? {
            if !held.is_expired_at(now) {
                return Ok(None);
            }
            self.expire(&held, now, ledger)?;
        }

        let verdict = evaluate(&definition.criteria, outcome, history);
        if !verdict.eligible {
            return Ok(None);
        }
        let Some(evidence) = verdict.evidence else {
            return Ok(None);
        };

        let badge = IssuedBadge {
            id: BadgeId(prefixed_id(
                "bdg",
                &[learner.as_str(), definition.id.as_str(), outcome.activity_id.as_str()],
            )),
            learner: learner.clone(),
            definition: definition.id.clone(),
            level: definition.level,
            issued_at: now,
            expires_at: definition
                .expiry_days
                .map(|days| crate::time::add_days(now, days)),
            evidence,
            verification_code: random::verification_code(),
            status: CredentialStatus::Active,
            revocation_reason: None,
            status_changed_at: None,
        };

        if !self.store.insert_badge_if_absent(badge.clone())? {
            log::debug!(
                "badge {} already held by {learner}, concurrent issuance ignored",
                definition.id
            );
            return Ok(None);
        }
        log::info!(
            "issued badge {} ({}) to {learner} from {}",
            badge.id,
            definition.id,
            outcome.activity_id
        );

        // Dispatch runs the certification cascade before returning.
        ledger.append(LedgerEvent::new(
            LedgerEventKind::BadgeIssued,
            learner.clone(),
            SubjectKind::Badge,
            badge.id.as_str(),
            json!({
                "definition": definition.id.as_str(),
                "level": definition.level.as_tag(),
                "source_activity": outcome.activity_id.as_str(),
            }),
        ))?;

        Ok(Some(badge.id))
    }

    /// Revoke an Active badge.
    pub fn revoke(&self, id: &BadgeId, reason: &str, ledger: &EventLedger) -> Result<IssuedBadge> {
        let now = crate::time::now_micros();
        let revoked = self
            .store
            .transition_badge(id, CredentialStatus::Revoked, Some(reason.to_string()), now)?
            .ok_or_else(|| ProgressionError::NotActive(format!("badge {id}")))?;
        log::info!("revoked badge {id} of {}: {reason}", revoked.learner);
        ledger.append(LedgerEvent::new(
            LedgerEventKind::BadgeRevoked,
            revoked.learner.clone(),
            SubjectKind::Badge,
            id.as_str(),
            json!({ "definition": revoked.definition.as_str(), "reason": reason }),
        ))?;
        Ok(revoked)
    }

    /// Move an Active, past-expiry badge to Expired. Returns `false` if
    /// another caller got there first.
    pub fn expire(&self, badge: &IssuedBadge, now: u64, ledger: &EventLedger) -> Result<bool> {
        let Some(expired) =
            self.store
                .transition_badge(&badge.id, CredentialStatus::Expired, None, now)?
        else {
            return Ok(false);
        };
        log::info!("badge {} of {} expired", expired.id, expired.learner);
        ledger.append(LedgerEvent::new(
            LedgerEventKind::BadgeExpired,
            expired.learner.clone(),
            SubjectKind::Badge,
            expired.id.as_str(),
            json!({ "definition": expired.definition.as_str() }),
        ))?;
        Ok(true)
    }

    /// Expire every Active badge past its expiry at `now`.
    pub fn expire_stale(&self, now: u64, ledger: &EventLedger) -> Result<Vec<BadgeId>> {
        let mut expired = Vec::new();
        for badge in self.store.active_badges()? {
            if badge.is_expired_at(now) && self.expire(&badge, now, ledger)? {
                expired.push(badge.id);
            }
        }
        Ok(expired)
    }
}
