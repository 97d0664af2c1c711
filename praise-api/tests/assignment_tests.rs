//! Quantifier assignment and replacement

mod common;

use common::*;
use praise_api::services::assignment::ReplaceQuantifierInput;
use praise_api::services::quantify::QuantifyInput;
use praise_common::db::{PeriodStatus, Role};
use praise_common::settings::keys;
use praise_common::Error;
use std::collections::HashMap;
use uuid::Uuid;

#[tokio::test]
async fn test_assign_balances_load_and_starts_quantifying() {
    let env = setup().await;
    let admin = admin(&env.pool).await;
    for name in ["alice", "bob", "carol", "dave"] {
        quantifier(&env.pool, name).await;
    }
    let giver = account(&env.pool, "giver", None).await;
    let receiver = account(&env.pool, "receiver", None).await;
    let period = current_period(&env.pool).await;
    let mut items = Vec::new();
    for _ in 0..4 {
        items.push(recent_praise(&env.pool, &giver, &receiver).await);
    }

    let details = env
        .state
        .services
        .assignment
        .assign_quantifiers(&caller(&admin), period.id)
        .await
        .unwrap();

    assert_eq!(details.period.status, PeriodStatus::Quantify);
    assert_eq!(details.praise_count, 4);
    // 4 items x 3 quantifiers over a pool of 4
    assert_eq!(details.quantifiers.len(), 4);
    assert!(details.quantifiers.iter().all(|q| q.assigned == 3));
    assert!(details.quantifiers.iter().all(|q| q.finished == 0));

    for item in &items {
        let stored = find_praise(&env.pool, item.id).await;
        assert_eq!(stored.quantifications.len(), 3);
        let mut ids: Vec<Uuid> = stored.quantifications.iter().map(|q| q.quantifier_id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }
    assert_eq!(event_count(&env.pool, "PERIOD").await, 1);
}

#[tokio::test]
async fn test_assign_skips_giver_and_receiver() {
    let env = setup().await;
    let admin = admin(&env.pool).await;
    let alice = quantifier(&env.pool, "alice").await;
    let bob = quantifier(&env.pool, "bob").await;
    for name in ["carol", "dave", "erin"] {
        quantifier(&env.pool, name).await;
    }
    let giver = account(&env.pool, "alice", Some(alice.id)).await;
    let receiver = account(&env.pool, "bob", Some(bob.id)).await;
    let period = current_period(&env.pool).await;
    let mut items = Vec::new();
    for _ in 0..3 {
        items.push(recent_praise(&env.pool, &giver, &receiver).await);
    }

    env.state
        .services
        .assignment
        .assign_quantifiers(&caller(&admin), period.id)
        .await
        .unwrap();

    for item in &items {
        let stored = find_praise(&env.pool, item.id).await;
        assert_eq!(stored.quantifications.len(), 3);
        for q in &stored.quantifications {
            assert_ne!(q.quantifier_id, alice.id);
            assert_ne!(q.quantifier_id, bob.id);
        }
    }
}

#[tokio::test]
async fn test_assign_with_small_pool_fails_without_changes() {
    let env = setup().await;
    let admin = admin(&env.pool).await;
    let alice = quantifier(&env.pool, "alice").await;
    quantifier(&env.pool, "bob").await;
    quantifier(&env.pool, "carol").await;
    let giver = account(&env.pool, "giver", None).await;
    let receiver = account(&env.pool, "alice", Some(alice.id)).await;
    let period = current_period(&env.pool).await;
    let item = recent_praise(&env.pool, &giver, &receiver).await;

    let requirement = env
        .state
        .services
        .assignment
        .verify_quantifier_pool_size(&caller(&admin), period.id)
        .await
        .unwrap();
    assert_eq!(requirement.quantifier_pool_size, 3);
    assert_eq!(requirement.quantifier_pool_size_needed, 4);
    assert_eq!(requirement.quantifier_pool_deficit_size, 1);

    let result = env
        .state
        .services
        .assignment
        .assign_quantifiers(&caller(&admin), period.id)
        .await;
    assert!(matches!(result, Err(Error::StateConflict(_))));

    assert_eq!(find_period(&env.pool, period.id).await.status, PeriodStatus::Open);
    assert!(find_praise(&env.pool, item.id).await.quantifications.is_empty());
    assert_eq!(event_count(&env.pool, "PERIOD").await, 0);
}

#[tokio::test]
async fn test_assign_requires_open_period() {
    let env = setup().await;
    let admin = admin(&env.pool).await;
    for name in ["alice", "bob", "carol"] {
        quantifier(&env.pool, name).await;
    }
    let giver = account(&env.pool, "giver", None).await;
    let receiver = account(&env.pool, "receiver", None).await;
    let period = current_period(&env.pool).await;
    recent_praise(&env.pool, &giver, &receiver).await;

    let service = &env.state.services.assignment;
    service.assign_quantifiers(&caller(&admin), period.id).await.unwrap();

    let again = service.assign_quantifiers(&caller(&admin), period.id).await;
    assert!(matches!(again, Err(Error::StateConflict(_))));
}

#[tokio::test]
async fn test_assign_empty_period_rejected() {
    let env = setup().await;
    let admin = admin(&env.pool).await;
    quantifier(&env.pool, "alice").await;
    let period = current_period(&env.pool).await;

    let result = env
        .state
        .services
        .assignment
        .assign_quantifiers(&caller(&admin), period.id)
        .await;
    assert!(matches!(result, Err(Error::StateConflict(_))));
}

#[tokio::test]
async fn test_assign_requires_permission() {
    let env = setup().await;
    let alice = quantifier(&env.pool, "alice").await;
    let period = current_period(&env.pool).await;

    let result = env
        .state
        .services
        .assignment
        .assign_quantifiers(&caller(&alice), period.id)
        .await;
    assert!(matches!(result, Err(Error::Forbidden(_))));
}

#[tokio::test]
async fn test_assign_only_covers_the_periods_own_praise() {
    let env = setup().await;
    let admin = admin(&env.pool).await;
    for name in ["alice", "bob", "carol"] {
        quantifier(&env.pool, name).await;
    }
    let giver = account(&env.pool, "giver", None).await;
    let receiver = account(&env.pool, "receiver", None).await;
    let now = chrono::Utc::now();
    let first = period(&env.pool, "First", now - chrono::Duration::days(10)).await;
    let old = praise_at(&env.pool, &giver, &receiver, now - chrono::Duration::days(12)).await;
    let second = period(&env.pool, "Second", now + chrono::Duration::days(1)).await;
    let new = recent_praise(&env.pool, &giver, &receiver).await;

    env.state
        .services
        .assignment
        .assign_quantifiers(&caller(&admin), second.id)
        .await
        .unwrap();

    assert!(find_praise(&env.pool, old.id).await.quantifications.is_empty());
    assert_eq!(find_praise(&env.pool, new.id).await.quantifications.len(), 3);
    assert_eq!(find_period(&env.pool, first.id).await.status, PeriodStatus::Open);
}

struct ReplaceFixture {
    env: TestEnv,
    admin_id: Uuid,
    alice: praise_common::db::User,
    carol: praise_common::db::User,
    period_id: Uuid,
    scored: Uuid,
    pending: Uuid,
}

/// Alice holds two assignments and has scored one of them
async fn replace_fixture() -> ReplaceFixture {
    let env = setup().await;
    let admin = admin(&env.pool).await;
    let alice = quantifier(&env.pool, "alice").await;
    let carol = quantifier(&env.pool, "carol").await;
    let giver = account(&env.pool, "giver", None).await;
    let receiver = account(&env.pool, "receiver", None).await;
    let period = current_period(&env.pool).await;
    set_period_setting(&env.pool, period.id, keys::QUANTIFIERS_PER_PRAISE_RECEIVER, "1").await;

    let scored = recent_praise(&env.pool, &giver, &receiver).await;
    let pending = recent_praise(&env.pool, &giver, &receiver).await;
    assign(&env.pool, scored.id, alice.id).await;
    assign(&env.pool, pending.id, alice.id).await;
    set_status(&env.pool, period.id, PeriodStatus::Quantify).await;

    let input = QuantifyInput {
        score: Some(5),
        ..Default::default()
    };
    env.state
        .services
        .quantification
        .quantify(&caller(&alice), scored.id, &input)
        .await
        .unwrap();

    ReplaceFixture {
        admin_id: admin.id,
        env,
        alice,
        carol,
        period_id: period.id,
        scored: scored.id,
        pending: pending.id,
    }
}

impl ReplaceFixture {
    async fn replace(&self, from: Uuid, to: Uuid) -> praise_common::Result<praise_api::services::assignment::ReplaceQuantifierResult> {
        let admin = praise_api::auth::Caller::new(self.admin_id, vec![Role::User, Role::Admin]);
        let input = ReplaceQuantifierInput {
            current_quantifier_id: from,
            new_quantifier_id: to,
        };
        self.env
            .state
            .services
            .assignment
            .replace_quantifier(&admin, self.period_id, &input)
            .await
    }
}

#[tokio::test]
async fn test_replace_moves_only_pending_work() {
    let f = replace_fixture().await;

    let result = f.replace(f.alice.id, f.carol.id).await.unwrap();

    let moved: Vec<Uuid> = result.praises.iter().map(|p| p.id).collect();
    assert_eq!(moved, vec![f.pending]);

    let scored = quantification(&f.env.pool, f.scored, f.alice.id).await;
    assert_eq!(scored.score, 5);
    let moved = quantification(&f.env.pool, f.pending, f.carol.id).await;
    assert_eq!(moved.score, 0);

    let progress: HashMap<String, (i64, i64)> = result
        .period
        .quantifiers
        .iter()
        .map(|q| (q.username.clone(), (q.assigned, q.finished)))
        .collect();
    assert_eq!(progress["alice"], (1, 1));
    assert_eq!(progress["carol"], (1, 0));
}

#[tokio::test]
async fn test_replace_with_same_user_rejected() {
    let f = replace_fixture().await;
    let result = f.replace(f.alice.id, f.alice.id).await;
    assert!(matches!(result, Err(Error::Validation(_))));
}

#[tokio::test]
async fn test_replace_requires_quantifier_role() {
    let f = replace_fixture().await;
    let plain = user(&f.env.pool, "plain", &[]).await;
    let result = f.replace(f.alice.id, plain.id).await;
    assert!(matches!(result, Err(Error::Validation(_))));
}

#[tokio::test]
async fn test_replace_unknown_user_not_found() {
    let f = replace_fixture().await;
    let result = f.replace(f.alice.id, Uuid::new_v4()).await;
    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_replace_without_pending_work_rejected() {
    let f = replace_fixture().await;
    let result = f.replace(f.carol.id, f.alice.id).await;
    assert!(matches!(result, Err(Error::Validation(_))));
}

#[tokio::test]
async fn test_replace_never_assigns_receiver() {
    let f = replace_fixture().await;
    let dave = quantifier(&f.env.pool, "dave").await;
    let giver = account(&f.env.pool, "someone", None).await;
    let dave_account = account(&f.env.pool, "dave", Some(dave.id)).await;
    let for_dave = recent_praise(&f.env.pool, &giver, &dave_account).await;
    assign(&f.env.pool, for_dave.id, f.alice.id).await;

    let result = f.replace(f.alice.id, dave.id).await;
    assert!(matches!(result, Err(Error::StateConflict(_))));

    // Nothing moved
    assert!(quantifications_of(&f, dave.id).await.is_empty());
}

#[tokio::test]
async fn test_replace_never_doubles_an_assignment() {
    let f = replace_fixture().await;
    assign(&f.env.pool, f.pending, f.carol.id).await;

    let result = f.replace(f.alice.id, f.carol.id).await;
    assert!(matches!(result, Err(Error::StateConflict(_))));
}

#[tokio::test]
async fn test_replace_requires_quantify_status() {
    let f = replace_fixture().await;
    set_status(&f.env.pool, f.period_id, PeriodStatus::Closed).await;

    let result = f.replace(f.alice.id, f.carol.id).await;
    assert!(matches!(result, Err(Error::StateConflict(_))));
}

async fn quantifications_of(f: &ReplaceFixture, quantifier_id: Uuid) -> Vec<Uuid> {
    sqlx::query_scalar("SELECT praise_id FROM quantifications WHERE quantifier_id = ?")
        .bind(quantifier_id)
        .fetch_all(&f.env.pool)
        .await
        .unwrap()
}
