use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

use crate::engine::error::EngineError;
use crate::engine::quota::{self, QuotaBalance};

/// leave_type_id reserved for the overtime pseudo-type.
pub const OVERTIME_TYPE_ID: u64 = 0;

/// Literal reason prefix that tags a row as overtime in storage. The prefix
/// is the wire discriminator the existing clients key on; it must round-trip
/// byte for byte.
pub const OT_TAG: &str = "[OT]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize, ToSchema)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TierStatus {
    Pending,
    Approved,
    Rejected,
    /// In the status domain for out-of-band admin edits only; the engine
    /// never assigns it. Bypassed tier-1 stays `pending` with is_bypass set.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize, ToSchema)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Approved,
    Rejected,
}

impl Outcome {
    fn as_tier_status(self) -> TierStatus {
        match self {
            Outcome::Approved => TierStatus::Approved,
            Outcome::Rejected => TierStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    First,
    Second,
}

impl Tier {
    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Tier::First),
            2 => Some(Tier::Second),
            _ => None,
        }
    }
}

/// Capability view of the caller, supplied explicitly on every engine call.
/// `is_hr` covers both the HR and admin roles.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub employee_id: u64,
    pub is_hr: bool,
}

/// Leave vs. overtime, promoted to a first-class variant internally. The
/// `[OT]` reason prefix exists only at the storage boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Leave { leave_type_id: u64 },
    Overtime,
}

impl RequestKind {
    /// Storage-side discriminator: the reason prefix decides, with the
    /// reserved type id as the degenerate case.
    pub fn from_stored(leave_type_id: u64, reason: &str) -> Self {
        if reason.starts_with(OT_TAG) || leave_type_id == OVERTIME_TYPE_ID {
            RequestKind::Overtime
        } else {
            RequestKind::Leave { leave_type_id }
        }
    }

    pub fn leave_type_id(&self) -> u64 {
        match self {
            RequestKind::Leave { leave_type_id } => *leave_type_id,
            RequestKind::Overtime => OVERTIME_TYPE_ID,
        }
    }

    pub fn is_overtime(&self) -> bool {
        matches!(self, RequestKind::Overtime)
    }
}

/// Applies the `[OT]` tag for storage. Leave reasons pass through untouched.
pub fn tag_reason(kind: RequestKind, reason: &str) -> String {
    match kind {
        RequestKind::Overtime if !reason.starts_with(OT_TAG) => {
            if reason.is_empty() {
                OT_TAG.to_string()
            } else {
                format!("{OT_TAG} {reason}")
            }
        }
        _ => reason.to_string(),
    }
}

/// Strips the `[OT]` tag for display.
pub fn strip_tag(reason: &str) -> &str {
    reason
        .strip_prefix(OT_TAG)
        .map(|rest| rest.trim_start())
        .unwrap_or(reason)
}

/// Submission payload after the handler has resolved the employee's static
/// approver assignment and read the quota balance.
#[derive(Debug, Clone)]
pub struct Submission<'a> {
    pub kind: RequestKind,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    /// Days for leave, hours for overtime.
    pub total_days: Decimal,
    pub reason: &'a str,
}

/// Validates a submission. Quota is checked here, at submission time, so an
/// employee cannot over-commit a balance before any approval lands; the
/// ledger itself is only debited once the request is approved.
pub fn validate_submission(
    sub: &Submission<'_>,
    balance: Option<&QuotaBalance>,
) -> Result<(), EngineError> {
    if sub.total_days <= Decimal::ZERO {
        return Err(EngineError::InvalidRange("non-positive duration"));
    }

    match sub.kind {
        RequestKind::Overtime => {
            if sub.start_at.date() != sub.end_at.date() {
                return Err(EngineError::InvalidRange(
                    "overtime must start and end on the same date",
                ));
            }
            if sub.start_at.time() >= sub.end_at.time() {
                return Err(EngineError::InvalidRange("end time must be after start time"));
            }
        }
        RequestKind::Leave { .. } => {
            if sub.start_at >= sub.end_at {
                return Err(EngineError::InvalidRange("end must be after start"));
            }
            if strip_tag(sub.reason).trim().is_empty() {
                return Err(EngineError::MissingReason);
            }
            quota::check_available(balance, sub.total_days)?;
        }
    }

    Ok(())
}

/// The per-request approval state the two-tier machine reads and writes.
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalState {
    pub expected_approver1_id: u64,
    /// Absent means a single-tier workflow.
    pub expected_approver2_id: Option<u64>,
    pub tier1_status: TierStatus,
    pub tier2_status: TierStatus,
    pub tier1_by: Option<u64>,
    pub tier1_at: Option<DateTime<Utc>>,
    pub tier2_by: Option<u64>,
    pub tier2_at: Option<DateTime<Utc>>,
    pub is_bypass: bool,
}

/// What a successful `decide` changed, for the caller to persist and to key
/// side effects (quota debit, notification) on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub tier: Tier,
    pub outcome: Outcome,
    /// Overall status after this decision.
    pub overall: RequestStatus,
    /// True when this decision was an HR override of a still-pending tier-1.
    pub bypass: bool,
}

impl ApprovalState {
    pub fn new(approver1: u64, approver2: Option<u64>) -> Self {
        ApprovalState {
            expected_approver1_id: approver1,
            expected_approver2_id: approver2,
            tier1_status: TierStatus::Pending,
            tier2_status: TierStatus::Pending,
            tier1_by: None,
            tier1_at: None,
            tier2_by: None,
            tier2_at: None,
            is_bypass: false,
        }
    }

    /// Overall status, derived from the tier fields and never stored as an
    /// independent source of truth. Approved iff every expected tier signed
    /// off, or tier-2 approved on the bypass path; rejected as soon as any
    /// evaluated tier rejected.
    pub fn overall(&self) -> RequestStatus {
        if self.tier1_status == TierStatus::Rejected || self.tier2_status == TierStatus::Rejected {
            return RequestStatus::Rejected;
        }

        let tier2_satisfied = match self.expected_approver2_id {
            Some(_) => self.tier2_status == TierStatus::Approved,
            None => true,
        };

        if tier2_satisfied && (self.tier1_status == TierStatus::Approved || self.is_bypass) {
            return RequestStatus::Approved;
        }

        RequestStatus::Pending
    }

    pub fn is_terminal(&self) -> bool {
        self.overall() != RequestStatus::Pending
    }

    /// The `pendingFor` visibility contract: HR/admin sees every pending
    /// request; a tier-1 approver sees it while tier-1 is open; a tier-2
    /// approver only once tier-1 has approved, never earlier.
    pub fn visible_to(&self, actor: &Actor) -> bool {
        if self.is_terminal() {
            return false;
        }
        if actor.is_hr {
            return true;
        }
        if actor.employee_id == self.expected_approver1_id
            && self.tier1_status == TierStatus::Pending
        {
            return true;
        }
        self.expected_approver2_id == Some(actor.employee_id)
            && self.tier1_status == TierStatus::Approved
            && self.tier2_status == TierStatus::Pending
    }

    /// Single tier transition. Mutates the state only on success; every
    /// error path leaves it untouched.
    pub fn decide(
        &mut self,
        tier: Tier,
        actor: &Actor,
        outcome: Outcome,
        force: bool,
        now: DateTime<Utc>,
    ) -> Result<Transition, EngineError> {
        if self.is_terminal() {
            return Err(EngineError::AlreadyTerminal);
        }

        match tier {
            Tier::First => {
                if actor.employee_id != self.expected_approver1_id && !actor.is_hr {
                    return Err(EngineError::NotAuthorized);
                }
                if self.tier1_status != TierStatus::Pending {
                    return Err(EngineError::AlreadyTerminal);
                }

                self.tier1_status = outcome.as_tier_status();
                self.tier1_by = Some(actor.employee_id);
                self.tier1_at = Some(now);

                Ok(Transition {
                    tier,
                    outcome,
                    overall: self.overall(),
                    bypass: false,
                })
            }
            Tier::Second => {
                let Some(approver2) = self.expected_approver2_id else {
                    return Err(EngineError::NotAuthorized);
                };
                if actor.employee_id != approver2 && !actor.is_hr {
                    return Err(EngineError::NotAuthorized);
                }
                if self.tier2_status != TierStatus::Pending {
                    return Err(EngineError::AlreadyTerminal);
                }

                let bypass = self.tier1_status != TierStatus::Approved;
                if bypass {
                    // Tier-1 has not signed off; only an explicit HR
                    // override may act here, and it is flagged permanently.
                    // Tier-1 itself stays `pending`.
                    if !(actor.is_hr && force) {
                        return Err(EngineError::NotAuthorized);
                    }
                    self.is_bypass = true;
                }

                self.tier2_status = outcome.as_tier_status();
                self.tier2_by = Some(actor.employee_id);
                self.tier2_at = Some(now);

                Ok(Transition {
                    tier,
                    outcome,
                    overall: self.overall(),
                    bypass,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use rust_decimal_macros::dec;

    const SUPERVISOR: u64 = 11;
    const HR: u64 = 22;
    const STRANGER: u64 = 99;

    fn supervisor() -> Actor {
        Actor {
            employee_id: SUPERVISOR,
            is_hr: false,
        }
    }

    fn hr() -> Actor {
        Actor {
            employee_id: HR,
            is_hr: true,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    fn two_tier() -> ApprovalState {
        ApprovalState::new(SUPERVISOR, Some(HR))
    }

    fn single_tier() -> ApprovalState {
        ApprovalState::new(SUPERVISOR, None)
    }

    #[test]
    fn single_tier_approval_is_immediately_terminal() {
        let mut state = single_tier();
        let t = state
            .decide(Tier::First, &supervisor(), Outcome::Approved, false, now())
            .unwrap();
        assert_eq!(t.overall, RequestStatus::Approved);
        assert_eq!(state.tier1_by, Some(SUPERVISOR));
        assert!(state.is_terminal());
    }

    #[test]
    fn single_tier_rejection_is_immediately_terminal() {
        let mut state = single_tier();
        let t = state
            .decide(Tier::First, &supervisor(), Outcome::Rejected, false, now())
            .unwrap();
        assert_eq!(t.overall, RequestStatus::Rejected);
    }

    #[test]
    fn two_tier_stays_pending_after_tier1_approval() {
        let mut state = two_tier();
        let t = state
            .decide(Tier::First, &supervisor(), Outcome::Approved, false, now())
            .unwrap();
        assert_eq!(t.overall, RequestStatus::Pending);
        assert_eq!(state.tier1_status, TierStatus::Approved);
        assert_eq!(state.tier2_status, TierStatus::Pending);
    }

    #[test]
    fn tier1_rejection_finalizes_without_touching_tier2() {
        let mut state = two_tier();
        state
            .decide(Tier::First, &supervisor(), Outcome::Rejected, false, now())
            .unwrap();
        assert_eq!(state.overall(), RequestStatus::Rejected);
        // tier-2 is never evaluated and stays pending, not skipped
        assert_eq!(state.tier2_status, TierStatus::Pending);
        assert_eq!(
            state.decide(Tier::Second, &hr(), Outcome::Approved, false, now()),
            Err(EngineError::AlreadyTerminal)
        );
    }

    #[test]
    fn full_two_tier_approval() {
        let mut state = two_tier();
        state
            .decide(Tier::First, &supervisor(), Outcome::Approved, false, now())
            .unwrap();
        let t = state
            .decide(Tier::Second, &hr(), Outcome::Approved, false, now())
            .unwrap();
        assert_eq!(t.overall, RequestStatus::Approved);
        assert!(!t.bypass);
        assert!(!state.is_bypass);
    }

    #[test]
    fn wrong_actor_is_not_authorized() {
        let mut state = two_tier();
        let intruder = Actor {
            employee_id: STRANGER,
            is_hr: false,
        };
        assert_eq!(
            state.decide(Tier::First, &intruder, Outcome::Approved, false, now()),
            Err(EngineError::NotAuthorized)
        );
        assert_eq!(state, two_tier());
    }

    #[test]
    fn hr_may_decide_tier1_for_the_supervisor() {
        let mut state = two_tier();
        let t = state
            .decide(Tier::First, &hr(), Outcome::Approved, false, now())
            .unwrap();
        assert_eq!(state.tier1_by, Some(HR));
        assert_eq!(t.overall, RequestStatus::Pending);
    }

    #[test]
    fn tier2_before_tier1_requires_hr_and_force() {
        // plain tier-2 approver, tier-1 still pending
        let mut state = two_tier();
        let plain_hr_actor = Actor {
            employee_id: HR,
            is_hr: false,
        };
        assert_eq!(
            state.decide(Tier::Second, &plain_hr_actor, Outcome::Approved, false, now()),
            Err(EngineError::NotAuthorized)
        );
        // HR without force is still refused
        assert_eq!(
            state.decide(Tier::Second, &hr(), Outcome::Approved, false, now()),
            Err(EngineError::NotAuthorized)
        );
        assert_eq!(state, two_tier());
    }

    #[test]
    fn hr_force_bypass_approves_and_leaves_tier1_pending() {
        let mut state = two_tier();
        let t = state
            .decide(Tier::Second, &hr(), Outcome::Approved, true, now())
            .unwrap();
        assert_eq!(t.overall, RequestStatus::Approved);
        assert!(t.bypass);
        assert!(state.is_bypass);
        assert_eq!(state.tier1_status, TierStatus::Pending);
        assert_eq!(state.tier2_status, TierStatus::Approved);
        assert_eq!(state.tier2_by, Some(HR));
    }

    #[test]
    fn bypass_rejection_is_flagged_too() {
        let mut state = two_tier();
        let t = state
            .decide(Tier::Second, &hr(), Outcome::Rejected, true, now())
            .unwrap();
        assert_eq!(t.overall, RequestStatus::Rejected);
        assert!(state.is_bypass);
        assert_eq!(state.tier1_status, TierStatus::Pending);
    }

    #[test]
    fn second_decide_on_terminal_request_fails_and_changes_nothing() {
        let mut state = single_tier();
        state
            .decide(Tier::First, &supervisor(), Outcome::Approved, false, now())
            .unwrap();
        let snapshot = state.clone();
        assert_eq!(
            state.decide(Tier::First, &supervisor(), Outcome::Approved, false, now()),
            Err(EngineError::AlreadyTerminal)
        );
        assert_eq!(state, snapshot);
    }

    #[test]
    fn redeciding_a_settled_tier_while_pending_overall_fails() {
        let mut state = two_tier();
        state
            .decide(Tier::First, &supervisor(), Outcome::Approved, false, now())
            .unwrap();
        assert_eq!(
            state.decide(Tier::First, &supervisor(), Outcome::Approved, false, now()),
            Err(EngineError::AlreadyTerminal)
        );
    }

    #[test]
    fn tier2_on_single_tier_request_is_not_authorized() {
        let mut state = single_tier();
        assert_eq!(
            state.decide(Tier::Second, &hr(), Outcome::Approved, true, now()),
            Err(EngineError::NotAuthorized)
        );
    }

    #[test]
    fn visibility_follows_tier_progress() {
        let mut state = two_tier();
        let tier2_approver = Actor {
            employee_id: HR,
            is_hr: false,
        };

        assert!(state.visible_to(&supervisor()));
        // tier-2 approver must not see it while tier-1 is merely pending
        assert!(!state.visible_to(&tier2_approver));
        // HR capability sees everything pending
        assert!(state.visible_to(&hr()));

        state
            .decide(Tier::First, &supervisor(), Outcome::Approved, false, now())
            .unwrap();
        assert!(!state.visible_to(&supervisor()));
        assert!(state.visible_to(&tier2_approver));

        state
            .decide(Tier::Second, &tier2_approver, Outcome::Approved, false, now())
            .unwrap();
        assert!(!state.visible_to(&hr()));
    }

    fn leave_submission(start: NaiveDateTime, end: NaiveDateTime) -> Submission<'static> {
        Submission {
            kind: RequestKind::Leave { leave_type_id: 2 },
            start_at: start,
            end_at: end,
            total_days: dec!(1),
            reason: "family matters",
        }
    }

    fn day(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn submission_rejects_inverted_range() {
        let sub = leave_submission(day(10, 9), day(9, 9));
        let balance = QuotaBalance {
            total: dec!(10),
            used: dec!(0),
            remaining: dec!(10),
        };
        assert!(matches!(
            validate_submission(&sub, Some(&balance)),
            Err(EngineError::InvalidRange(_))
        ));
    }

    #[test]
    fn submission_rejects_non_positive_amount() {
        let mut sub = leave_submission(day(9, 9), day(10, 9));
        sub.total_days = dec!(0);
        assert!(matches!(
            validate_submission(&sub, None),
            Err(EngineError::InvalidRange(_))
        ));
    }

    #[test]
    fn submission_requires_reason_for_leave() {
        let mut sub = leave_submission(day(9, 9), day(10, 9));
        sub.reason = "  ";
        assert_eq!(
            validate_submission(&sub, None),
            Err(EngineError::MissingReason)
        );
    }

    #[test]
    fn submission_enforces_quota() {
        let sub = leave_submission(day(9, 9), day(10, 9));
        let exhausted = QuotaBalance {
            total: dec!(10),
            used: dec!(10),
            remaining: dec!(0),
        };
        assert!(matches!(
            validate_submission(&sub, Some(&exhausted)),
            Err(EngineError::InsufficientQuota { .. })
        ));
    }

    #[test]
    fn overtime_must_be_same_day_and_skips_quota() {
        let ot = Submission {
            kind: RequestKind::Overtime,
            start_at: day(9, 18),
            end_at: day(9, 21),
            total_days: dec!(3),
            reason: "",
        };
        // no balance at all: overtime does not consult the ledger
        assert!(validate_submission(&ot, None).is_ok());

        let spans_days = Submission {
            end_at: day(10, 2),
            ..ot.clone()
        };
        assert!(matches!(
            validate_submission(&spans_days, None),
            Err(EngineError::InvalidRange(_))
        ));

        let inverted = Submission {
            start_at: day(9, 21),
            end_at: day(9, 18),
            ..ot
        };
        assert!(matches!(
            validate_submission(&inverted, None),
            Err(EngineError::InvalidRange(_))
        ));
    }

    #[test]
    fn ot_tag_round_trips() {
        assert_eq!(
            tag_reason(RequestKind::Overtime, "server migration"),
            "[OT] server migration"
        );
        assert_eq!(tag_reason(RequestKind::Overtime, ""), "[OT]");
        // already tagged text is not tagged twice
        assert_eq!(
            tag_reason(RequestKind::Overtime, "[OT] replay"),
            "[OT] replay"
        );
        assert_eq!(
            tag_reason(RequestKind::Leave { leave_type_id: 1 }, "vacation"),
            "vacation"
        );

        assert_eq!(
            RequestKind::from_stored(0, "[OT] server migration"),
            RequestKind::Overtime
        );
        assert_eq!(
            RequestKind::from_stored(2, "vacation"),
            RequestKind::Leave { leave_type_id: 2 }
        );
        assert_eq!(strip_tag("[OT] server migration"), "server migration");
        assert_eq!(strip_tag("vacation"), "vacation");
    }
}
