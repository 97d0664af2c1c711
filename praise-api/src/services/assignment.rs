//! Quantifier assignment
//!
//! Distributes the quantifier pool over the praise of a period and moves
//! pending work from one quantifier to another mid-period.
//!
//! **Planning rules:**
//! - Each praise item gets `per_praise` distinct quantifiers
//! - A quantifier never judges praise they gave or received
//! - The least-loaded eligible quantifiers are picked first, so without
//!   exclusions loads differ by at most one
//! - Ties prefer quantifiers already serving the same receiver, then a
//!   shuffle seeded from the period id (stable across reruns)

use praise_common::db::{PeriodStatus, Praise, Role};
use praise_common::events::{EventLog, EventLogTypeKey, NewEvent};
use praise_common::{settings, Error, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::info;
use uuid::Uuid;

use crate::auth::{Caller, Permission};
use crate::db::praise::AssignmentCandidate;
use crate::db::{periods, praise, quantifications, users};
use crate::services::periods::{period_details, PeriodDetails};
use crate::services::quantify::recompute_praise_score;

/// Outcome of a pool size check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolRequirement {
    pub quantifier_pool_size: usize,
    pub quantifier_pool_size_needed: usize,
    pub quantifier_pool_deficit_size: usize,
}

/// One quantifier assigned to one praise item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedAssignment {
    pub praise_id: Uuid,
    pub quantifier_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceQuantifierInput {
    #[serde(alias = "oldQuantifierId")]
    pub current_quantifier_id: Uuid,
    pub new_quantifier_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceQuantifierResult {
    pub period: PeriodDetails,
    pub praises: Vec<Praise>,
}

/// Pool size needed so every praise item can get `per_praise` eligible
/// quantifiers
///
/// The worst case is the praise item that excludes the most pool members.
pub fn pool_requirement(
    candidates: &[AssignmentCandidate],
    pool: &[Uuid],
    per_praise: usize,
) -> PoolRequirement {
    let max_excluded = candidates
        .iter()
        .map(|c| c.excluded_users.iter().filter(|u| pool.contains(u)).count())
        .max()
        .unwrap_or(0);

    let needed = per_praise + max_excluded;
    PoolRequirement {
        quantifier_pool_size: pool.len(),
        quantifier_pool_size_needed: needed,
        quantifier_pool_deficit_size: needed.saturating_sub(pool.len()),
    }
}

/// Deterministic tie-break order of the pool for a given seed
fn tie_rank(pool: &[Uuid], seed: u64) -> HashMap<Uuid, usize> {
    let mut order = pool.to_vec();
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);
    order.into_iter().enumerate().map(|(rank, id)| (id, rank)).collect()
}

/// Plan assignments for every candidate praise item
///
/// Fails with `StateConflict` when some praise item has fewer than
/// `per_praise` eligible quantifiers.
pub fn plan_assignments(
    candidates: &[AssignmentCandidate],
    pool: &[Uuid],
    per_praise: usize,
    seed: u64,
) -> Result<Vec<PlannedAssignment>> {
    let rank = tie_rank(pool, seed);
    let mut load: HashMap<Uuid, usize> = pool.iter().map(|id| (*id, 0)).collect();

    let mut by_receiver: BTreeMap<Uuid, Vec<&AssignmentCandidate>> = BTreeMap::new();
    for candidate in candidates {
        by_receiver.entry(candidate.receiver_id).or_default().push(candidate);
    }
    let mut groups: Vec<(Uuid, Vec<&AssignmentCandidate>)> = by_receiver.into_iter().collect();
    groups.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then(a.0.cmp(&b.0)));

    let mut plan = Vec::with_capacity(candidates.len() * per_praise);

    for (_, mut items) in groups {
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.praise_id.cmp(&b.praise_id)));
        let mut serving: HashSet<Uuid> = HashSet::new();

        for item in items {
            let mut eligible: Vec<Uuid> = pool
                .iter()
                .copied()
                .filter(|id| !item.excluded_users.contains(id))
                .collect();
            if eligible.len() < per_praise {
                return Err(Error::conflict(format!(
                    "Not enough eligible quantifiers for praise {}: {} available, {} needed",
                    item.praise_id,
                    eligible.len(),
                    per_praise
                )));
            }

            eligible.sort_by_key(|id| {
                (
                    load.get(id).copied().unwrap_or(0),
                    !serving.contains(id),
                    rank.get(id).copied().unwrap_or(usize::MAX),
                )
            });

            for quantifier_id in eligible.into_iter().take(per_praise) {
                *load.entry(quantifier_id).or_insert(0) += 1;
                serving.insert(quantifier_id);
                plan.push(PlannedAssignment {
                    praise_id: item.praise_id,
                    quantifier_id,
                });
            }
        }
    }

    Ok(plan)
}

pub struct AssignmentService {
    db: SqlitePool,
    events: EventLog,
}

impl AssignmentService {
    pub fn new(db: SqlitePool, events: EventLog) -> Self {
        Self { db, events }
    }

    pub async fn verify_quantifier_pool_size(
        &self,
        caller: &Caller,
        period_id: Uuid,
    ) -> Result<PoolRequirement> {
        caller.require(Permission::PeriodAssign)?;

        let mut conn = self.db.acquire().await?;
        let period = periods::find_period(&mut conn, period_id)
            .await?
            .ok_or_else(|| Error::not_found("Period"))?;
        let (start, end) = periods::date_range(&mut conn, &period).await?;
        let candidates = praise::assignment_candidates(&mut conn, start, end).await?;
        let pool = users::quantifier_pool(&mut conn).await?;
        let per_praise = settings::quantifiers_per_praise(&mut conn, period.id).await?;

        Ok(pool_requirement(&candidates, &pool, per_praise))
    }

    /// Assign quantifiers to every praise item of an OPEN period and move the
    /// period to QUANTIFY
    pub async fn assign_quantifiers(&self, caller: &Caller, period_id: Uuid) -> Result<PeriodDetails> {
        caller.require(Permission::PeriodAssign)?;

        let mut tx = self.db.begin().await?;
        let period = periods::find_period(&mut *tx, period_id)
            .await?
            .ok_or_else(|| Error::not_found("Period"))?;
        if period.status != PeriodStatus::Open {
            return Err(Error::conflict(
                "Quantifiers can only be assigned when period status is OPEN",
            ));
        }

        let (start, end) = periods::date_range(&mut *tx, &period).await?;
        let candidates = praise::assignment_candidates(&mut *tx, start, end).await?;
        if candidates.is_empty() {
            return Err(Error::conflict("Period does not contain any praise"));
        }
        if quantifications::count_in_range(&mut *tx, start, end).await? > 0 {
            return Err(Error::conflict("Quantifiers have already been assigned"));
        }

        let pool = users::quantifier_pool(&mut *tx).await?;
        let per_praise = settings::quantifiers_per_praise(&mut *tx, period.id).await?;
        let requirement = pool_requirement(&candidates, &pool, per_praise);
        if requirement.quantifier_pool_deficit_size > 0 {
            return Err(Error::conflict(format!(
                "Quantifier pool is too small: {} needed, {} available",
                requirement.quantifier_pool_size_needed, requirement.quantifier_pool_size
            )));
        }

        let plan = plan_assignments(&candidates, &pool, per_praise, period.id.as_u64_pair().0)?;
        for assignment in &plan {
            quantifications::insert_assignment(&mut *tx, assignment.praise_id, assignment.quantifier_id)
                .await?;
        }
        periods::update_status(&mut *tx, period.id, PeriodStatus::Quantify).await?;

        let event = NewEvent::new(
            EventLogTypeKey::Period,
            format!(
                "Assigned {} quantifiers to {} praise items in period \"{}\"",
                pool.len(),
                candidates.len(),
                period.name
            ),
        )
        .by(caller.user_id)
        .in_period(period.id);
        let entry = self.events.log(&mut *tx, event).await?;

        let refreshed = periods::find_period(&mut *tx, period.id)
            .await?
            .ok_or_else(|| Error::not_found("Period"))?;
        let details = period_details(&mut *tx, refreshed).await?;
        tx.commit().await?;

        info!(
            period_id = %period.id,
            praise = candidates.len(),
            assignments = plan.len(),
            "Assigned quantifiers"
        );
        self.events.publish(entry);
        Ok(details)
    }

    /// Move a quantifier's pending assignments in a QUANTIFY period to another
    /// quantifier; submitted judgments stay where they are
    pub async fn replace_quantifier(
        &self,
        caller: &Caller,
        period_id: Uuid,
        input: &ReplaceQuantifierInput,
    ) -> Result<ReplaceQuantifierResult> {
        caller.require(Permission::PeriodAssign)?;

        let old_id = input.current_quantifier_id;
        let new_id = input.new_quantifier_id;
        if old_id == new_id {
            return Err(Error::validation(
                "Current and new quantifier must be different users",
            ));
        }

        let mut tx = self.db.begin().await?;
        let period = periods::find_period(&mut *tx, period_id)
            .await?
            .ok_or_else(|| Error::not_found("Period"))?;
        if period.status != PeriodStatus::Quantify {
            return Err(Error::conflict(
                "Quantifiers can only be replaced when period status is QUANTIFY",
            ));
        }

        let old_user = users::find_user(&mut *tx, old_id)
            .await?
            .ok_or_else(|| Error::not_found("Current quantifier"))?;
        let new_user = users::find_user(&mut *tx, new_id)
            .await?
            .ok_or_else(|| Error::not_found("New quantifier"))?;
        if !new_user.has_role(Role::Quantifier) {
            return Err(Error::validation("New quantifier does not hold the QUANTIFIER role"));
        }

        let (start, end) = periods::date_range(&mut *tx, &period).await?;
        let pending = quantifications::pending_for_quantifier_in_range(&mut *tx, old_id, start, end).await?;
        if pending.is_empty() {
            return Err(Error::validation(format!(
                "{} has no pending assignments in this period",
                old_user.username
            )));
        }

        let exclusions: HashMap<Uuid, Vec<Uuid>> = praise::assignment_candidates(&mut *tx, start, end)
            .await?
            .into_iter()
            .map(|c| (c.praise_id, c.excluded_users))
            .collect();

        for q in &pending {
            if exclusions.get(&q.praise_id).is_some_and(|excluded| excluded.contains(&new_id)) {
                return Err(Error::conflict(format!(
                    "{} cannot quantify praise {} they gave or received",
                    new_user.username, q.praise_id
                )));
            }
            if quantifications::find_by_praise_and_quantifier(&mut *tx, q.praise_id, new_id)
                .await?
                .is_some()
            {
                return Err(Error::conflict(format!(
                    "{} is already assigned to praise {}",
                    new_user.username, q.praise_id
                )));
            }
        }

        let mut affected: Vec<Uuid> = Vec::new();
        for q in &pending {
            quantifications::reassign(&mut *tx, q.id, new_id).await?;
            affected.push(q.praise_id);
            // Praise the old quantifier marked as duplicate of a moved item loses its original
            for dup in quantifications::find_duplicates_of(&mut *tx, q.praise_id, old_id).await? {
                if !affected.contains(&dup.praise_id) {
                    affected.push(dup.praise_id);
                }
            }
        }

        let duplicate_percentage = settings::duplicate_score_percentage(&mut *tx, period.id).await?;
        let mut praises = Vec::with_capacity(affected.len());
        for id in &affected {
            recompute_praise_score(&mut *tx, *id, duplicate_percentage).await?;
            let item = praise::find_praise(&mut *tx, *id)
                .await?
                .ok_or_else(|| Error::not_found("Praise item"))?;
            praises.push(item);
        }

        let event = NewEvent::new(
            EventLogTypeKey::Period,
            format!(
                "Reassigned {} pending quantifications from \"{}\" to \"{}\" in period \"{}\"",
                pending.len(),
                old_user.username,
                new_user.username,
                period.name
            ),
        )
        .by(caller.user_id)
        .in_period(period.id);
        let entry = self.events.log(&mut *tx, event).await?;
        let details = period_details(&mut *tx, period).await?;
        tx.commit().await?;

        info!(
            from = %old_id,
            to = %new_id,
            moved = pending.len(),
            "Replaced quantifier"
        );
        self.events.publish(entry);
        Ok(ReplaceQuantifierResult {
            period: details,
            praises,
        })
    }
}
