//! Escrow lifecycle, roster and commission split behavior against an
//! in-memory SQLite database with the real migrations applied.

mod common;

use common::*;
use diesel::prelude::*;

use escrow_server::error::EscrowError;
use escrow_server::models::commission_split::CommissionSplit;
use escrow_server::models::escrow::{EscrowStatus, EscrowTransaction};
use escrow_server::models::escrow_participant::{EscrowParticipant, EscrowRole};
use escrow_server::models::user::User;
use escrow_server::schema::{commission_splits, escrow_participants};
use escrow_server::services::escrow::{AcceptRequest, EscrowLifecycle, InviteRequest};

fn participants(conn: &mut SqliteConnection, transaction_id: &str) -> Vec<EscrowParticipant> {
    EscrowParticipant::find_by_transaction(conn, transaction_id).unwrap()
}

fn accept_as(conn: &mut SqliteConnection, transaction_id: &str, user: &User) -> EscrowStatus {
    EscrowLifecycle::new(conn)
        .accept(transaction_id, user, AcceptRequest::default())
        .unwrap()
        .status
}

#[test]
fn test_create_puts_transaction_in_inviting_with_broker_participant() {
    let mut conn = conn();
    let broker = broker(&mut conn, BROKER);

    let view = create(&mut conn, &broker);

    assert_eq!(view.status, EscrowStatus::Inviting);
    assert_eq!(view.created_by, broker.id);
    assert_eq!(view.property_value.unwrap().to_string(), "4500000.00");
    assert_eq!(view.participants.len(), 1);
    assert_eq!(view.participants[0].role, EscrowRole::Broker);
    assert_eq!(view.participants[0].email, BROKER);
    assert!(!view.participants[0].has_accepted);
    assert!(view.commission_split.is_none());

    let stored = participants(&mut conn, &view.id);
    assert_eq!(stored[0].user_id.as_deref(), Some(broker.id.as_str()));
}

#[test]
fn test_non_broker_cannot_create() {
    let mut conn = conn();
    let plain = user(&mut conn, "plain@example.com");

    let result = EscrowLifecycle::new(&mut conn).create_transaction(&plain, create_request());

    assert!(matches!(result, Err(EscrowError::Authorization(_))));
    let count: i64 = escrow_server::schema::escrow_transactions::table
        .count()
        .get_result(&mut conn)
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn test_create_rejects_blank_agreement_name() {
    let mut conn = conn();
    let broker = broker(&mut conn, BROKER);
    let mut request = create_request();
    request.agreement_name = String::new();

    let result = EscrowLifecycle::new(&mut conn).create_transaction(&broker, request);
    assert!(matches!(result, Err(EscrowError::Validation(_))));
}

#[test]
fn test_full_acceptance_scenario() {
    let mut conn = conn();
    let broker = broker(&mut conn, BROKER);
    let buyer = user(&mut conn, BUYER);
    let seller = user(&mut conn, SELLER);
    let tx = create(&mut conn, &broker);

    // Buyer only, no seller and no co-broker
    let buyer_only = InviteRequest {
        buyer_email: BUYER.to_string(),
        ..Default::default()
    };
    let result = EscrowLifecycle::new(&mut conn).invite(&tx.id, &broker, buyer_only);
    assert!(matches!(result, Err(EscrowError::Validation(_))));

    let invited = EscrowLifecycle::new(&mut conn)
        .invite(&tx.id, &broker, buyer_and_seller())
        .unwrap();
    assert_eq!(invited.status, EscrowStatus::PendingAcceptance);
    assert_eq!(invited.participants.len(), 3);
    assert!(invited.participants.iter().all(|p| !p.has_accepted));

    assert_eq!(accept_as(&mut conn, &tx.id, &buyer), EscrowStatus::PendingAcceptance);
    assert_eq!(accept_as(&mut conn, &tx.id, &broker), EscrowStatus::PendingAcceptance);
    assert_eq!(accept_as(&mut conn, &tx.id, &seller), EscrowStatus::Active);

    let stored = EscrowTransaction::find_by_id(&mut conn, &tx.id).unwrap();
    assert_eq!(stored.status().unwrap(), EscrowStatus::Active);

    // Accepting again never moves the status back
    assert_eq!(accept_as(&mut conn, &tx.id, &buyer), EscrowStatus::Active);
}

#[test]
fn test_accept_links_user_to_invited_participant() {
    let mut conn = conn();
    let broker = broker(&mut conn, BROKER);
    let buyer = user(&mut conn, BUYER);
    let tx = create(&mut conn, &broker);
    EscrowLifecycle::new(&mut conn)
        .invite(&tx.id, &broker, buyer_and_seller())
        .unwrap();

    let before = participants(&mut conn, &tx.id);
    let invited_buyer = before.iter().find(|p| p.email == BUYER).unwrap();
    assert!(invited_buyer.user_id.is_none());

    accept_as(&mut conn, &tx.id, &buyer);

    let after = participants(&mut conn, &tx.id);
    let accepted_buyer = after.iter().find(|p| p.email == BUYER).unwrap();
    assert_eq!(accepted_buyer.user_id.as_deref(), Some(buyer.id.as_str()));
    assert!(accepted_buyer.has_accepted);
}

#[test]
fn test_accept_with_email_override() {
    let mut conn = conn();
    let broker = broker(&mut conn, BROKER);
    let other_account = user(&mut conn, "seller.personal@example.com");
    let tx = create(&mut conn, &broker);
    EscrowLifecycle::new(&mut conn)
        .invite(&tx.id, &broker, buyer_and_seller())
        .unwrap();

    let request = AcceptRequest {
        email: Some(SELLER.to_string()),
        token: None,
    };
    let view = EscrowLifecycle::new(&mut conn)
        .accept(&tx.id, &other_account, request)
        .unwrap();

    let seller = view.participants.iter().find(|p| p.role == EscrowRole::Seller).unwrap();
    assert!(seller.has_accepted);
}

#[test]
fn test_accept_by_stranger_is_not_found() {
    let mut conn = conn();
    let broker = broker(&mut conn, BROKER);
    let stranger = user(&mut conn, "stranger@example.com");
    let tx = create(&mut conn, &broker);
    EscrowLifecycle::new(&mut conn)
        .invite(&tx.id, &broker, buyer_and_seller())
        .unwrap();

    let result = EscrowLifecycle::new(&mut conn).accept(&tx.id, &stranger, AcceptRequest::default());
    assert!(matches!(result, Err(EscrowError::NotFound(_))));

    let result = EscrowLifecycle::new(&mut conn).accept("missing-id", &broker, AcceptRequest::default());
    assert!(matches!(result, Err(EscrowError::NotFound(_))));
}

#[test]
fn test_lone_broker_acceptance_activates_before_invite() {
    let mut conn = conn();
    let broker = broker(&mut conn, BROKER);
    let tx = create(&mut conn, &broker);

    assert_eq!(accept_as(&mut conn, &tx.id, &broker), EscrowStatus::Active);

    // Inviting reopens the transaction for the new parties
    let view = EscrowLifecycle::new(&mut conn)
        .invite(&tx.id, &broker, buyer_and_seller())
        .unwrap();
    assert_eq!(view.status, EscrowStatus::PendingAcceptance);
    assert_eq!(view.participants.len(), 3);
}

#[test]
fn test_reinvite_after_active_resets_consent() {
    let mut conn = conn();
    let broker = broker(&mut conn, BROKER);
    let buyer = user(&mut conn, BUYER);
    let seller = user(&mut conn, SELLER);
    let tx = create(&mut conn, &broker);

    EscrowLifecycle::new(&mut conn)
        .invite(&tx.id, &broker, buyer_and_seller())
        .unwrap();
    accept_as(&mut conn, &tx.id, &buyer);
    accept_as(&mut conn, &tx.id, &broker);
    assert_eq!(accept_as(&mut conn, &tx.id, &seller), EscrowStatus::Active);

    let again = EscrowLifecycle::new(&mut conn)
        .invite(&tx.id, &broker, buyer_and_seller())
        .unwrap();
    assert_eq!(again.status, EscrowStatus::PendingAcceptance);
    for p in &again.participants {
        match p.role {
            EscrowRole::Buyer | EscrowRole::Seller => assert!(!p.has_accepted, "{} kept consent", p.role),
            _ => assert!(p.has_accepted),
        }
    }

    // A fresh round of consent activates it again
    accept_as(&mut conn, &tx.id, &buyer);
    assert_eq!(accept_as(&mut conn, &tx.id, &seller), EscrowStatus::Active);
}

#[test]
fn test_reinvite_is_idempotent_and_resets_acceptance() {
    let mut conn = conn();
    let broker = broker(&mut conn, BROKER);
    let buyer = user(&mut conn, BUYER);
    let tx = create(&mut conn, &broker);

    EscrowLifecycle::new(&mut conn)
        .invite(&tx.id, &broker, buyer_and_seller())
        .unwrap();
    accept_as(&mut conn, &tx.id, &buyer);
    accept_as(&mut conn, &tx.id, &broker);

    let again = EscrowLifecycle::new(&mut conn)
        .invite(&tx.id, &broker, buyer_and_seller())
        .unwrap();
    assert_eq!(again.status, EscrowStatus::PendingAcceptance);
    assert_eq!(again.participants.len(), 3);

    for role in [EscrowRole::Broker, EscrowRole::Buyer, EscrowRole::Seller] {
        let count: i64 = escrow_participants::table
            .filter(escrow_participants::transaction_id.eq(&tx.id))
            .filter(escrow_participants::role.eq(role.as_str()))
            .count()
            .get_result(&mut conn)
            .unwrap();
        assert_eq!(count, 1, "{} duplicated", role);
    }

    let by_role = |role: EscrowRole| {
        again
            .participants
            .iter()
            .find(|p| p.role == role)
            .map(|p| p.has_accepted)
            .unwrap()
    };
    // Invited parties are reset; the broker's get-or-create leaves it alone
    assert!(!by_role(EscrowRole::Buyer));
    assert!(!by_role(EscrowRole::Seller));
    assert!(by_role(EscrowRole::Broker));
}

#[test]
fn test_only_creating_broker_can_invite() {
    let mut conn = conn();
    let creator = broker(&mut conn, BROKER);
    let other_broker = broker(&mut conn, "other.broker@example.com");
    let tx = create(&mut conn, &creator);

    let result = EscrowLifecycle::new(&mut conn).invite(&tx.id, &other_broker, buyer_and_seller());
    assert!(matches!(result, Err(EscrowError::Authorization(_))));

    // Creator who lost broker capability is refused too
    User::set_broker(&mut conn, &creator.id, false).unwrap();
    let demoted = User::find_by_id(&mut conn, &creator.id).unwrap();
    let result = EscrowLifecycle::new(&mut conn).invite(&tx.id, &demoted, buyer_and_seller());
    assert!(matches!(result, Err(EscrowError::Authorization(_))));
}

#[test]
fn test_authorization_checked_before_payload() {
    let mut conn = conn();
    let creator = broker(&mut conn, BROKER);
    let other_broker = broker(&mut conn, "other.broker@example.com");
    let tx = create(&mut conn, &creator);

    let bad_payload = InviteRequest {
        buyer_email: "not-an-email".to_string(),
        ..Default::default()
    };
    let result = EscrowLifecycle::new(&mut conn).invite(&tx.id, &other_broker, bad_payload);
    assert!(matches!(result, Err(EscrowError::Authorization(_))));
}

#[test]
fn test_co_broker_split_is_stored() {
    let mut conn = conn();
    let broker = broker(&mut conn, BROKER);
    let co_broker = user(&mut conn, CO_BROKER);
    let tx = create(&mut conn, &broker);

    let view = EscrowLifecycle::new(&mut conn)
        .invite(&tx.id, &broker, with_co_broker("60.00", "40.00"))
        .unwrap();

    let split = view.commission_split.unwrap();
    assert_eq!(split.broker_id, broker.id);
    assert_eq!(split.co_broker_id.as_deref(), Some(co_broker.id.as_str()));
    assert_eq!(split.broker_share_pct.to_string(), "60.00");
    assert_eq!(split.co_broker_share_pct.unwrap().to_string(), "40.00");
    assert_eq!(view.participants.len(), 4);
    assert!(view.participants.iter().any(|p| p.role == EscrowRole::CoBroker));

    let row = CommissionSplit::find_by_transaction(&mut conn, &tx.id).unwrap().unwrap();
    assert_eq!(row.broker_share_hundredths, 6_000);
    assert_eq!(row.co_broker_share_hundredths, Some(4_000));
}

#[test]
fn test_no_co_broker_gives_full_share_to_broker() {
    let mut conn = conn();
    let broker = broker(&mut conn, BROKER);
    let tx = create(&mut conn, &broker);

    let mut request = buyer_and_seller();
    request.broker_share_pct = Some("70".parse().unwrap());

    let view = EscrowLifecycle::new(&mut conn).invite(&tx.id, &broker, request).unwrap();
    let split = view.commission_split.unwrap();
    assert_eq!(split.broker_share_pct.to_string(), "100.00");
    assert!(split.co_broker_share_pct.is_none());
    assert!(split.co_broker_id.is_none());
    assert!(split.co_broker_email.is_none());
}

#[test]
fn test_unregistered_co_broker_leaves_split_link_null() {
    let mut conn = conn();
    let broker = broker(&mut conn, BROKER);
    let tx = create(&mut conn, &broker);

    let view = EscrowLifecycle::new(&mut conn)
        .invite(&tx.id, &broker, with_co_broker("50", "50"))
        .unwrap();

    let split = view.commission_split.unwrap();
    assert!(split.co_broker_id.is_none());
    assert_eq!(split.co_broker_email.as_deref(), Some(CO_BROKER));
    assert_eq!(split.co_broker_share_pct.unwrap().to_string(), "50.00");
}

#[test]
fn test_co_broker_shares_must_total_exactly_hundred() {
    let mut conn = conn();
    let broker = broker(&mut conn, BROKER);
    let tx = create(&mut conn, &broker);

    for (broker_pct, co_pct) in [("60.00", "39.99"), ("60.01", "40.00")] {
        let result = EscrowLifecycle::new(&mut conn).invite(
            &tx.id,
            &broker,
            with_co_broker(broker_pct, co_pct),
        );
        assert!(matches!(result, Err(EscrowError::Validation(_))));
    }

    // Nothing from the failed invites was persisted
    let stored = EscrowTransaction::find_by_id(&mut conn, &tx.id).unwrap();
    assert_eq!(stored.status().unwrap(), EscrowStatus::Inviting);
    assert_eq!(participants(&mut conn, &tx.id).len(), 1);
    assert!(CommissionSplit::find_by_transaction(&mut conn, &tx.id).unwrap().is_none());

    let ok = EscrowLifecycle::new(&mut conn)
        .invite(&tx.id, &broker, with_co_broker("99.99", "0.01"))
        .unwrap();
    assert_eq!(ok.status, EscrowStatus::PendingAcceptance);
}

#[test]
fn test_co_broker_missing_percentage_rejected() {
    let mut conn = conn();
    let broker = broker(&mut conn, BROKER);
    let tx = create(&mut conn, &broker);

    let mut request = with_co_broker("60", "40");
    request.co_broker_share_pct = None;

    let result = EscrowLifecycle::new(&mut conn).invite(&tx.id, &broker, request);
    assert!(matches!(result, Err(EscrowError::Validation(_))));
}

#[test]
fn test_co_broker_without_seller_is_allowed() {
    let mut conn = conn();
    let broker = broker(&mut conn, BROKER);
    let tx = create(&mut conn, &broker);

    let mut request = with_co_broker("60", "40");
    request.seller_email = Some("   ".to_string());

    let view = EscrowLifecycle::new(&mut conn).invite(&tx.id, &broker, request).unwrap();
    assert!(view.participants.iter().all(|p| p.role != EscrowRole::Seller));
}

#[test]
fn test_split_upsert_replaces_previous_values() {
    let mut conn = conn();
    let broker = broker(&mut conn, BROKER);
    let tx = create(&mut conn, &broker);

    EscrowLifecycle::new(&mut conn)
        .invite(&tx.id, &broker, with_co_broker("60", "40"))
        .unwrap();
    EscrowLifecycle::new(&mut conn)
        .invite(&tx.id, &broker, buyer_and_seller())
        .unwrap();

    let count: i64 = commission_splits::table
        .filter(commission_splits::transaction_id.eq(&tx.id))
        .count()
        .get_result(&mut conn)
        .unwrap();
    assert_eq!(count, 1);

    let row = CommissionSplit::find_by_transaction(&mut conn, &tx.id).unwrap().unwrap();
    assert_eq!(row.broker_share_hundredths, 10_000);
    assert_eq!(row.co_broker_share_hundredths, None);
    assert_eq!(row.co_broker_email, None);
}

#[test]
fn test_validate_transaction_requires_buyer_and_seller() {
    let mut conn = conn();
    let broker = broker(&mut conn, BROKER);
    let tx = create(&mut conn, &broker);

    let err = EscrowLifecycle::new(&mut conn).validate_transaction(&tx.id).unwrap_err();
    assert!(err.to_string().contains("buyer and seller"));

    EscrowLifecycle::new(&mut conn)
        .invite(&tx.id, &broker, without_seller(with_co_broker("60", "40")))
        .unwrap();
    let err = EscrowLifecycle::new(&mut conn).validate_transaction(&tx.id).unwrap_err();
    assert!(err.to_string().contains("seller"));
    assert!(!err.to_string().contains("buyer"));

    EscrowLifecycle::new(&mut conn)
        .invite(&tx.id, &broker, buyer_and_seller())
        .unwrap();
    assert!(EscrowLifecycle::new(&mut conn).validate_transaction(&tx.id).is_ok());

    User::set_broker(&mut conn, &broker.id, false).unwrap();
    let err = EscrowLifecycle::new(&mut conn).validate_transaction(&tx.id).unwrap_err();
    assert!(err.to_string().contains("Creator must be a broker"));
}

fn without_seller(mut request: InviteRequest) -> InviteRequest {
    request.seller_email = None;
    request
}

#[test]
fn test_get_and_list_respect_participation() {
    let mut conn = conn();
    let broker = broker(&mut conn, BROKER);
    let buyer = user(&mut conn, BUYER);
    let stranger = user(&mut conn, "stranger@example.com");

    let first = create(&mut conn, &broker);
    let second = create(&mut conn, &broker);
    EscrowLifecycle::new(&mut conn)
        .invite(&first.id, &broker, buyer_and_seller())
        .unwrap();

    let mine = EscrowLifecycle::new(&mut conn).list_transactions(&broker).unwrap();
    let mut ids: Vec<&str> = mine.iter().map(|t| t.id.as_str()).collect();
    ids.sort_unstable();
    let mut expected = vec![first.id.as_str(), second.id.as_str()];
    expected.sort_unstable();
    assert_eq!(ids, expected);

    // Invited by email, not yet linked
    let buyers = EscrowLifecycle::new(&mut conn).list_transactions(&buyer).unwrap();
    assert_eq!(buyers.len(), 1);
    assert_eq!(buyers[0].id, first.id);
    assert!(EscrowLifecycle::new(&mut conn).get_transaction(&first.id, &buyer).is_ok());

    assert!(EscrowLifecycle::new(&mut conn).list_transactions(&stranger).unwrap().is_empty());
    assert!(matches!(
        EscrowLifecycle::new(&mut conn).get_transaction(&first.id, &stranger),
        Err(EscrowError::Authorization(_))
    ));
    assert!(matches!(
        EscrowLifecycle::new(&mut conn).get_transaction("missing-id", &broker),
        Err(EscrowError::NotFound(_))
    ));
}

#[test]
fn test_delete_cascades_to_participants_and_split() {
    let mut conn = conn();
    let broker = broker(&mut conn, BROKER);
    let tx = create(&mut conn, &broker);
    EscrowLifecycle::new(&mut conn)
        .invite(&tx.id, &broker, with_co_broker("60", "40"))
        .unwrap();

    EscrowTransaction::delete(&mut conn, &tx.id).unwrap();

    assert!(participants(&mut conn, &tx.id).is_empty());
    assert!(CommissionSplit::find_by_transaction(&mut conn, &tx.id).unwrap().is_none());
}
