use axum::{
    extract::{rejection::JsonRejection, Path, Query, State as AxumState},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use marcador_execution::{
    EventDraft, EventListing, Receipt, RefundReport, SettlementReport, WalletSummary,
};
use marcador_types::{
    BetId, Event, EventId, OptionId, PayoutDetails, ReferralStatus, Score, Transaction, User,
    UserBet, UserId, Withdrawal, WithdrawalId,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::ApiError;
use crate::Service;

type Shared = AxumState<Arc<Service>>;
type Body<T> = Result<Json<T>, JsonRejection>;
type Reply<T> = Result<Json<T>, ApiError>;
type Created<T> = Result<(StatusCode, Json<T>), ApiError>;

#[derive(Serialize)]
struct HealthzResponse {
    ok: bool,
    durable: bool,
}

#[derive(Deserialize)]
pub(super) struct RegisterRequest {
    phone: String,
    #[serde(default)]
    invitation_code: Option<String>,
}

#[derive(Deserialize)]
pub(super) struct CreditRequest {
    amount: u64,
    #[serde(default)]
    reference: Option<String>,
}

#[derive(Deserialize)]
pub(super) struct AdjustmentRequest {
    delta: i64,
    description: String,
}

#[derive(Deserialize)]
pub(super) struct CommissionQuery {
    base: u64,
}

#[derive(Serialize)]
pub(super) struct CommissionQuote {
    user_id: UserId,
    base: u64,
    rate_bps: u16,
    commission: u64,
}

#[derive(Deserialize)]
pub(super) struct BetRequest {
    user_id: UserId,
    event_id: EventId,
    option_id: OptionId,
    amount: u64,
}

#[derive(Deserialize)]
pub(super) struct SettleRequest {
    score: Score,
}

#[derive(Deserialize)]
pub(super) struct WithdrawalRequest {
    user_id: UserId,
    amount: u64,
    payout: PayoutDetails,
}

#[derive(Deserialize)]
pub(super) struct RejectRequest {
    reason: String,
}

pub(super) async fn healthz(AxumState(service): Shared) -> Response {
    Json(HealthzResponse {
        ok: true,
        durable: service.durable,
    })
    .into_response()
}

pub(super) async fn register_user(
    AxumState(service): Shared,
    body: Body<RegisterRequest>,
) -> Created<User> {
    let Json(request) = body?;
    let user = service
        .ledger
        .register_user(&request.phone, request.invitation_code.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub(super) async fn get_user(AxumState(service): Shared, Path(id): Path<UserId>) -> Reply<User> {
    Ok(Json(service.ledger.user(id).await?))
}

pub(super) async fn referral_status(
    AxumState(service): Shared,
    Path(id): Path<UserId>,
) -> Reply<ReferralStatus> {
    Ok(Json(service.ledger.referral_status(id).await?))
}

pub(super) async fn commission_quote(
    AxumState(service): Shared,
    Path(id): Path<UserId>,
    Query(query): Query<CommissionQuery>,
) -> Reply<CommissionQuote> {
    let status = service.ledger.referral_status(id).await?;
    Ok(Json(CommissionQuote {
        user_id: id,
        base: query.base,
        rate_bps: status.rate_bps,
        commission: status.commission_on(query.base),
    }))
}

pub(super) async fn get_wallet(
    AxumState(service): Shared,
    Path(id): Path<UserId>,
) -> Reply<WalletSummary> {
    Ok(Json(service.ledger.wallet(id).await?))
}

pub(super) async fn list_transactions(
    AxumState(service): Shared,
    Path(id): Path<UserId>,
) -> Reply<Vec<Transaction>> {
    Ok(Json(service.ledger.transactions(id).await?))
}

pub(super) async fn deposit(
    AxumState(service): Shared,
    Path(id): Path<UserId>,
    body: Body<CreditRequest>,
) -> Created<Receipt> {
    let Json(request) = body?;
    let receipt = service
        .ledger
        .mint_deposit(id, request.amount, request.reference.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

pub(super) async fn commission(
    AxumState(service): Shared,
    Path(id): Path<UserId>,
    body: Body<CreditRequest>,
) -> Created<Receipt> {
    let Json(request) = body?;
    let receipt = service
        .ledger
        .credit_commission(id, request.amount, request.reference.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

pub(super) async fn adjustment(
    AxumState(service): Shared,
    Path(id): Path<UserId>,
    body: Body<AdjustmentRequest>,
) -> Created<Receipt> {
    let Json(request) = body?;
    let receipt = service
        .ledger
        .adjust_balance(id, request.delta, &request.description)
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

pub(super) async fn list_user_bets(
    AxumState(service): Shared,
    Path(id): Path<UserId>,
) -> Reply<Vec<UserBet>> {
    Ok(Json(service.ledger.bets(id).await?))
}

pub(super) async fn list_events(AxumState(service): Shared) -> Reply<Vec<Event>> {
    Ok(Json(service.ledger.events().await?))
}

pub(super) async fn create_event(
    AxumState(service): Shared,
    body: Body<EventDraft>,
) -> Created<EventListing> {
    let Json(draft) = body?;
    let listing = service.ledger.create_event(draft).await?;
    Ok((StatusCode::CREATED, Json(listing)))
}

pub(super) async fn get_event(
    AxumState(service): Shared,
    Path(id): Path<EventId>,
) -> Reply<EventListing> {
    Ok(Json(service.ledger.event(id).await?))
}

pub(super) async fn list_event_bets(
    AxumState(service): Shared,
    Path(id): Path<EventId>,
) -> Reply<Vec<UserBet>> {
    Ok(Json(service.ledger.event_bets(id).await?))
}

/// Settles the event. A report with failures is still a 200: the caller inspects it and
/// repeats the request to resume.
pub(super) async fn settle_event(
    AxumState(service): Shared,
    Path(id): Path<EventId>,
    body: Body<SettleRequest>,
) -> Reply<SettlementReport> {
    let Json(request) = body?;
    Ok(Json(service.ledger.settle_event(id, request.score).await?))
}

pub(super) async fn cancel_event(
    AxumState(service): Shared,
    Path(id): Path<EventId>,
) -> Reply<RefundReport> {
    Ok(Json(service.ledger.cancel_event(id).await?))
}

pub(super) async fn place_bet(
    AxumState(service): Shared,
    body: Body<BetRequest>,
) -> Created<UserBet> {
    let Json(request) = body?;
    let bet = service
        .ledger
        .place_bet(
            request.user_id,
            request.event_id,
            request.option_id,
            request.amount,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(bet)))
}

pub(super) async fn get_bet(AxumState(service): Shared, Path(id): Path<BetId>) -> Reply<UserBet> {
    Ok(Json(service.ledger.bet(id).await?))
}

pub(super) async fn request_withdrawal(
    AxumState(service): Shared,
    body: Body<WithdrawalRequest>,
) -> Created<Withdrawal> {
    let Json(request) = body?;
    let withdrawal = service
        .ledger
        .request_withdrawal(request.user_id, request.amount, request.payout)
        .await?;
    Ok((StatusCode::CREATED, Json(withdrawal)))
}

pub(super) async fn get_withdrawal(
    AxumState(service): Shared,
    Path(id): Path<WithdrawalId>,
) -> Reply<Withdrawal> {
    Ok(Json(service.ledger.withdrawal(id).await?))
}

pub(super) async fn list_withdrawals(
    AxumState(service): Shared,
    Path(id): Path<UserId>,
) -> Reply<Vec<Withdrawal>> {
    Ok(Json(service.ledger.withdrawals(id).await?))
}

pub(super) async fn approve_withdrawal(
    AxumState(service): Shared,
    Path(id): Path<WithdrawalId>,
) -> Reply<Withdrawal> {
    Ok(Json(service.ledger.approve_withdrawal(id).await?))
}

pub(super) async fn reject_withdrawal(
    AxumState(service): Shared,
    Path(id): Path<WithdrawalId>,
    body: Body<RejectRequest>,
) -> Reply<Withdrawal> {
    let Json(request) = body?;
    Ok(Json(service.ledger.reject_withdrawal(id, &request.reason).await?))
}
