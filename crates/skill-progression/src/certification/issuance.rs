//! Certification issuance service.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::json;

use crate::badge::{BadgeDefinitionId, BadgeId, CredentialStatus, IssuedBadge};
use crate::crypto::signing::CredentialSigner;
use crate::crypto::{ids::prefixed_id, random};
use crate::error::{ProgressionError, Result};
use crate::ledger::{EventLedger, LedgerEvent, LedgerEventKind, LedgerObserver, SubjectKind};
use crate::progress::LearnerId;
use crate::store::ProgressionStore;

use super::types::*;

// ---------------------------------------------------------------------------
// Definition validation
// ---------------------------------------------------------------------------

/// Validate a certification definition against the stored badge definitions.
pub fn validate_certification_definition(
    definition: &CertificationDefinition,
    store: &dyn ProgressionStore,
) -> Result<()> {
    if definition.id.0.trim().is_empty() {
        return Err(ProgressionError::InvalidDefinition(
            "certification definition id is empty".into(),
        ));
    }
    if definition.name.trim().is_empty() || definition.issuing_authority.trim().is_empty() {
        return Err(ProgressionError::InvalidDefinition(format!(
            "certification {} needs a name and an issuing authority",
            definition.id
        )));
    }
    if !definition.badges.iter().any(|b| b.required) {
        return Err(ProgressionError::InvalidDefinition(format!(
            "certification {} lists no required badge",
            definition.id
        )));
    }
    if definition.validity_days == Some(0) {
        return Err(ProgressionError::InvalidDefinition(format!(
            "certification {} is valid for 0 days",
            definition.id
        )));
    }
    let mut seen = HashSet::new();
    for listed in &definition.badges {
        if !seen.insert(&listed.badge) {
            return Err(ProgressionError::InvalidDefinition(format!(
                "certification {} lists badge {} twice",
                definition.id, listed.badge
            )));
        }
        if store.badge_definition(&listed.badge)?.is_none() {
            return Err(ProgressionError::InvalidDefinition(format!(
                "certification {} lists unknown badge {}",
                definition.id, listed.badge
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Eligibility
// ---------------------------------------------------------------------------

/// Whether `held` (the learner's current badges) satisfies `definition`.
///
/// Every required badge must be held. With a minimum level configured, no
/// held badge listed by the definition may be below it; optional badges
/// count toward that check too.
pub fn is_eligible(definition: &CertificationDefinition, held: &[IssuedBadge]) -> bool {
    let held_definitions: HashSet<&BadgeDefinitionId> =
        held.iter().map(|b| &b.definition).collect();

    let required_held = definition
        .badges
        .iter()
        .filter(|b| b.required)
        .all(|b| held_definitions.contains(&b.badge));
    if !required_held {
        return false;
    }

    match definition.min_badge_level {
        Some(min) => held
            .iter()
            .filter(|b| definition.lists(&b.definition))
            .all(|b| b.level >= min),
        None => true,
    }
}

// ---------------------------------------------------------------------------
// Issuer
// ---------------------------------------------------------------------------

/// Issues signed certifications when their badge requirements are met.
///
/// Subscribed to the [`EventLedger`], it runs on every `BadgeIssued` event
/// inside the append that recorded it.
pub struct CertificationIssuer {
    store: Arc<dyn ProgressionStore>,
    signer: Arc<CredentialSigner>,
    number_prefix: String,
}

impl CertificationIssuer {
    /// Create an issuer signing with `signer`.
    pub fn new(
        store: Arc<dyn ProgressionStore>,
        signer: Arc<CredentialSigner>,
        number_prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            signer,
            number_prefix: number_prefix.into(),
        }
    }

    /// React to a newly issued badge by checking every definition that
    /// lists it.
    pub fn on_badge_earned(
        &self,
        learner: &LearnerId,
        badge_id: &BadgeId,
        ledger: &EventLedger,
    ) -> Result<Vec<CertificationId>> {
        let badge = self
            .store
            .badge(badge_id)?
            .ok_or_else(|| ProgressionError::NotFound(format!("badge {badge_id}")))?;
        if &badge.learner != learner {
            return Err(ProgressionError::NotFound(format!(
                "badge {badge_id} for {learner}"
            )));
        }
        self.evaluate_definitions(learner, ledger, |d| d.lists(&badge.definition))
    }

    /// Check every active definition for `learner` and issue what is due.
    pub fn check_eligibility(
        &self,
        learner: &LearnerId,
        ledger: &EventLedger,
    ) -> Result<Vec<CertificationId>> {
        self.evaluate_definitions(learner, ledger, |_| true)
    }

    fn evaluate_definitions(
        &self,
        learner: &LearnerId,
        ledger: &EventLedger,
        relevant: impl Fn(&CertificationDefinition) -> bool,
    ) -> Result<Vec<CertificationId>> {
        let definitions: Vec<CertificationDefinition> = self
            .store
            .certification_definitions()?
            .into_iter()
            .filter(|d| d.active && relevant(d))
            .collect();
        if definitions.is_empty() {
            return Ok(Vec::new());
        }

        let mut issued = Vec::new();
        for definition in &definitions {
            match self.try_issue(learner, definition, ledger) {
                Ok(Some(id)) => issued.push(id),
                Ok(None) => {}
                Err(e) => log::error!(
                    "certification {} skipped for {learner}: {e}",
                    definition.id
                ),
            }
        }
        Ok(issued)
    }

    fn try_issue(
        &self,
        learner: &LearnerId,
        definition: &CertificationDefinition,
        ledger: &EventLedger,
    ) -> Result<Option<CertificationId>> {
        let now = crate::time::now_micros();

        if let Some(held) = self.store.active_certification(learner, &definition.id)? {
            if !held.is_expired_at(now) {
                return Ok(None);
            }
            self.expire(&held, now, ledger)?;
        }

        let current: Vec<IssuedBadge> = self
            .store
            .badges_for_learner(learner)?
            .into_iter()
            .filter(|b| b.is_current(now))
            .collect();
        if !is_eligible(definition, &current) {
            log::debug!("{learner} not yet eligible for {}", definition.id);
            return Ok(None);
        }

        let mut badge_snapshot: Vec<BadgeDefinitionId> =
            current.iter().map(|b| b.definition.clone()).collect();
        badge_snapshot.sort();
        badge_snapshot.dedup();

        let verification_code = random::verification_code();
        let certification = IssuedCertification {
            id: CertificationId(prefixed_id(
                "cert",
                &[learner.as_str(), definition.id.as_str()],
            )),
            learner: learner.clone(),
            definition: definition.id.clone(),
            certification_number: format!(
                "{}-{}-{}",
                self.number_prefix,
                crate::time::micros_to_date_stamp(now),
                random::serial_hex()
            ),
            signature: self.signer.sign(learner, &definition.id, &verification_code),
            verification_code,
            badge_snapshot,
            issued_at: now,
            expires_at: definition
                .validity_days
                .map(|days| crate::time::add_days(now, days)),
            status: CredentialStatus::Active,
            revocation_reason: None,
            status_changed_at: None,
        };

        if !self
            .store
            .insert_certification_if_absent(certification.clone())?
        {
            log::debug!(
                "certification {} already held by {learner}, concurrent issuance ignored",
                definition.id
            );
            return Ok(None);
        }
        log::info!(
            "issued certification {} ({}) to {learner}",
            certification.certification_number,
            definition.id
        );

        ledger.append(LedgerEvent::new(
            LedgerEventKind::CertificationIssued,
            learner.clone(),
            SubjectKind::Certification,
            certification.id.as_str(),
            json!({
                "definition": definition.id.as_str(),
                "certification_number": certification.certification_number,
                "badges": certification.badge_snapshot,
                "course": definition.course,
            }),
        ))?;

        Ok(Some(certification.id))
    }

    /// Revoke an Active certification.
    pub fn revoke(
        &self,
        id: &CertificationId,
        reason: &str,
        ledger: &EventLedger,
    ) -> Result<IssuedCertification> {
        let now = crate::time::now_micros();
        let revoked = self
            .store
            .transition_certification(
                id,
                CredentialStatus::Revoked,
                Some(reason.to_string()),
                now,
            )?
            .ok_or_else(|| ProgressionError::NotActive(format!("certification {id}")))?;
        log::info!(
            "revoked certification {} of {}: {reason}",
            revoked.certification_number,
            revoked.learner
        );
        let course = self.course_of(&revoked.definition)?;
        ledger.append(LedgerEvent::new(
            LedgerEventKind::CertificationRevoked,
            revoked.learner.clone(),
            SubjectKind::Certification,
            id.as_str(),
            json!({
                "definition": revoked.definition.as_str(),
                "reason": reason,
                "course": course,
            }),
        ))?;
        Ok(revoked)
    }

    /// Move an Active, past-expiry certification to Expired. Returns
    /// `false` if another caller got there first.
    pub fn expire(
        &self,
        certification: &IssuedCertification,
        now: u64,
        ledger: &EventLedger,
    ) -> Result<bool> {
        let Some(expired) = self.store.transition_certification(
            &certification.id,
            CredentialStatus::Expired,
            None,
            now,
        )?
        else {
            return Ok(false);
        };
        log::info!(
            "certification {} of {} expired",
            expired.certification_number,
            expired.learner
        );
        let course = self.course_of(&expired.definition)?;
        ledger.append(LedgerEvent::new(
            LedgerEventKind::CertificationExpired,
            expired.learner.clone(),
            SubjectKind::Certification,
            expired.id.as_str(),
            json!({ "definition": expired.definition.as_str(), "course": course }),
        ))?;
        Ok(true)
    }

    /// Expire every Active certification past its expiry at `now`.
    pub fn expire_stale(&self, now: u64, ledger: &EventLedger) -> Result<Vec<CertificationId>> {
        let mut expired = Vec::new();
        for certification in self.store.active_certifications()? {
            if certification.is_expired_at(now) && self.expire(&certification, now, ledger)? {
                expired.push(certification.id);
            }
        }
        Ok(expired)
    }

    fn course_of(&self, definition: &CertificationDefinitionId) -> Result<Option<String>> {
        Ok(self
            .store
            .certification_definition(definition)?
            .and_then(|d| d.course)
            .map(|c| c.0))
    }
}

impl LedgerObserver for CertificationIssuer {
    fn on_event(&self, event: &LedgerEvent, ledger: &EventLedger) {
        if event.kind != LedgerEventKind::BadgeIssued {
            return;
        }
        let badge = BadgeId::new(event.subject_id.as_str());
        if let Err(e) = self.on_badge_earned(&event.learner, &badge, ledger) {
            log::error!(
                "certification cascade failed for {} after badge {badge}: {e}",
                event.learner
            );
        }
    }
}
