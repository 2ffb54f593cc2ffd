/// Lead endpoints
///
/// ```text
/// GET    /v1/leads?search=&status=&source=&assignedTo=
/// POST   /v1/leads
/// GET    /v1/leads/:id
/// PUT    /v1/leads/:id
/// DELETE /v1/leads/:id
/// POST   /v1/leads/:id/convert
/// ```
///
/// Conversion runs in one transaction: an account when the lead names a
/// company, a contact, optionally a deal, then the lead is marked
/// `converted` with links to what was created.

use axum::{extract::State, Extension};
use chrono::NaiveDate;
use salescrm_shared::auth::{
    authorization::{Action, Module},
    middleware::AuthContext,
    scope::enforce_scope,
};
use salescrm_shared::models::account::{Account, CreateAccount};
use salescrm_shared::models::activity_log::LogAction;
use salescrm_shared::models::contact::{Contact, CreateContact};
use salescrm_shared::models::deal::{CreateDeal, Deal};
use salescrm_shared::models::lead::{ConversionLinks, CreateLead, Lead, LeadFilter, LeadStatus, UpdateLead};
use salescrm_shared::models::notification::{kind, NewNotification, Notification};
use salescrm_shared::pagination::PageParams;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    access::{assign_owner, authorize, log_activity, notify},
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath, ApiQuery},
    response::ApiResponse,
};

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ConvertLeadRequest {
    /// Also open a deal for the new contact
    #[serde(default)]
    pub create_deal: bool,
    #[validate(length(min = 1, max = 255))]
    pub deal_name: Option<String>,
    #[validate(range(min = 0.0, message = "Amount cannot be negative"))]
    pub deal_amount: Option<f64>,
    pub expected_close_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResponse {
    pub lead: Lead,
    pub account: Option<Account>,
    pub contact: Contact,
    pub deal: Option<Deal>,
}

fn lead_name(lead: &Lead) -> String {
    match &lead.last_name {
        Some(last) if !last.is_empty() => format!("{} {}", lead.first_name, last),
        _ => lead.first_name.clone(),
    }
}

fn assignment_notice(lead: &Lead, user_id: Uuid) -> NewNotification {
    NewNotification {
        user_id,
        kind: kind::LEAD_ASSIGNED,
        title: "Lead assigned to you".to_string(),
        message: format!("You have been assigned the lead {}", lead_name(lead)),
        link: Some(format!("/leads/{}", lead.id)),
    }
}

pub async fn list_leads(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(page): ApiQuery<PageParams>,
    ApiQuery(filter): ApiQuery<LeadFilter>,
) -> ApiResult<ApiResponse<Vec<Lead>>> {
    let scope = authorize(&state, &auth, Module::Leads, Action::View).await?;

    let (leads, total) = Lead::list(
        &state.db,
        auth.tenant_id,
        &filter,
        scope.owner_filter(),
        page.limit(),
        page.offset(),
    )
    .await?;

    Ok(ApiResponse::page(leads, page.paginate(total)))
}

pub async fn get_lead(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<Lead>> {
    let scope = authorize(&state, &auth, Module::Leads, Action::View).await?;

    let lead = Lead::find_by_id(&state.db, auth.tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Lead"))?;
    enforce_scope(&lead, &scope)?;

    Ok(ApiResponse::ok(lead))
}

pub async fn create_lead(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<CreateLead>,
) -> ApiResult<ApiResponse<Lead>> {
    let scope = authorize(&state, &auth, Module::Leads, Action::Create).await?;
    req.validate()?;

    if req.status == Some(LeadStatus::Converted) {
        return Err(ApiError::validation("status", "Leads are converted through the convert action"));
    }

    let assigned_to = assign_owner(&state, &auth, &scope, req.assigned_to).await?;
    let lead = Lead::create(&state.db, auth.tenant_id, assigned_to, req).await?;

    notify(&state, &auth, assignment_notice(&lead, assigned_to)).await;
    log_activity(&state, &auth, LogAction::Create, "lead", Some(lead.id), json!({ "name": lead_name(&lead) })).await;

    Ok(ApiResponse::created(lead))
}

pub async fn update_lead(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateLead>,
) -> ApiResult<ApiResponse<Lead>> {
    let scope = authorize(&state, &auth, Module::Leads, Action::Edit).await?;
    req.validate()?;

    let current = Lead::find_by_id(&state.db, auth.tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Lead"))?;
    enforce_scope(&current, &scope)?;

    match req.status {
        Some(LeadStatus::Converted) if !current.is_converted() => {
            return Err(ApiError::validation("status", "Leads are converted through the convert action"));
        }
        Some(status) if current.is_converted() && status != LeadStatus::Converted => {
            return Err(ApiError::validation("status", "A converted lead cannot change status"));
        }
        _ => {}
    }

    let reassigned_to = match req.assigned_to {
        Some(user_id) if current.assigned_to != Some(user_id) => {
            Some(assign_owner(&state, &auth, &scope, Some(user_id)).await?)
        }
        _ => None,
    };

    let lead = Lead::update(&state.db, auth.tenant_id, id, req)
        .await?
        .ok_or_else(|| ApiError::not_found("Lead"))?;

    if let Some(user_id) = reassigned_to {
        notify(&state, &auth, assignment_notice(&lead, user_id)).await;
    }
    log_activity(&state, &auth, LogAction::Update, "lead", Some(id), json!({ "status": lead.status })).await;

    Ok(ApiResponse::ok(lead))
}

pub async fn delete_lead(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<Option<()>>> {
    let scope = authorize(&state, &auth, Module::Leads, Action::Delete).await?;

    let current = Lead::find_by_id(&state.db, auth.tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Lead"))?;
    enforce_scope(&current, &scope)?;

    Lead::delete(&state.db, auth.tenant_id, id).await?;

    log_activity(&state, &auth, LogAction::Delete, "lead", Some(id), json!({ "name": lead_name(&current) })).await;

    Ok(ApiResponse::empty("Lead deleted"))
}

/// `POST /v1/leads/:id/convert`
///
/// # Errors
///
/// - `403 Forbidden`: lead outside the caller's scope, or no create
///   permission on contacts
/// - `404 Not Found`: no such lead in the tenant
/// - `409 Conflict`: lead already converted
pub async fn convert_lead(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<ConvertLeadRequest>,
) -> ApiResult<ApiResponse<ConversionResponse>> {
    let scope = authorize(&state, &auth, Module::Leads, Action::Edit).await?;
    authorize(&state, &auth, Module::Contacts, Action::Create).await?;
    if req.create_deal {
        authorize(&state, &auth, Module::Deals, Action::Create).await?;
    }
    req.validate()?;

    let lead = Lead::find_by_id(&state.db, auth.tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Lead"))?;
    enforce_scope(&lead, &scope)?;

    if lead.is_converted() {
        return Err(ApiError::Conflict("Lead has already been converted".to_string()));
    }

    let owner_id = lead.assigned_to.unwrap_or(auth.user_id);
    let company = lead.company.as_deref().map(str::trim).filter(|c| !c.is_empty());

    let mut tx = state.db.begin().await?;

    let account = match company {
        Some(name) => Some(
            Account::create(
                &mut *tx,
                auth.tenant_id,
                owner_id,
                CreateAccount {
                    name: name.to_string(),
                    phone: lead.phone.clone(),
                    email: lead.email.clone(),
                    ..Default::default()
                },
            )
            .await?,
        ),
        None => None,
    };
    let account_id = account.as_ref().map(|a| a.id);

    let contact = Contact::create(
        &mut *tx,
        auth.tenant_id,
        owner_id,
        CreateContact {
            account_id,
            first_name: lead.first_name.clone(),
            last_name: lead.last_name.clone(),
            email: lead.email.clone(),
            phone: lead.phone.clone(),
            notes: lead.notes.clone(),
            ..Default::default()
        },
    )
    .await?;

    let deal = if req.create_deal {
        let name = req
            .deal_name
            .clone()
            .unwrap_or_else(|| format!("{} deal", company.map(str::to_string).unwrap_or_else(|| lead_name(&lead))));
        Some(
            Deal::create(
                &mut *tx,
                auth.tenant_id,
                owner_id,
                CreateDeal {
                    name,
                    account_id,
                    contact_id: Some(contact.id),
                    lead_id: Some(lead.id),
                    amount: req.deal_amount.or(lead.estimated_value),
                    expected_close_date: req.expected_close_date,
                    ..Default::default()
                },
            )
            .await?,
        )
    } else {
        None
    };

    let converted = Lead::mark_converted(
        &mut *tx,
        auth.tenant_id,
        id,
        ConversionLinks {
            account_id,
            contact_id: contact.id,
            deal_id: deal.as_ref().map(|d| d.id),
        },
    )
    .await?
    .ok_or_else(|| ApiError::Conflict("Lead has already been converted".to_string()))?;

    if owner_id != auth.user_id {
        Notification::create(
            &mut *tx,
            auth.tenant_id,
            NewNotification {
                user_id: owner_id,
                kind: kind::LEAD_CONVERTED,
                title: "Lead converted".to_string(),
                message: format!("Your lead {} was converted", lead_name(&lead)),
                link: Some(format!("/contacts/{}", contact.id)),
            },
        )
        .await?;
    }

    tx.commit().await?;

    tracing::info!(
        lead_id = %id,
        contact_id = %contact.id,
        account_id = ?account_id,
        deal_id = ?deal.as_ref().map(|d| d.id),
        "Converted lead"
    );
    log_activity(
        &state,
        &auth,
        LogAction::Convert,
        "lead",
        Some(id),
        json!({
            "accountId": account_id,
            "contactId": contact.id,
            "dealId": deal.as_ref().map(|d| d.id),
        }),
    )
    .await;

    Ok(ApiResponse::ok(ConversionResponse {
        lead: converted,
        account,
        contact,
        deal,
    })
    .message("Lead converted"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_request_defaults() {
        let req: ConvertLeadRequest = serde_json::from_str("{}").unwrap();
        assert!(!req.create_deal);
        assert!(req.deal_name.is_none());

        let req: ConvertLeadRequest =
            serde_json::from_str(r#"{"createDeal":true,"dealAmount":1200.5,"expectedCloseDate":"2026-12-01"}"#)
                .unwrap();
        assert!(req.create_deal);
        assert_eq!(req.deal_amount, Some(1200.5));
        assert_eq!(req.expected_close_date, NaiveDate::from_ymd_opt(2026, 12, 1));
    }

    #[test]
    fn test_negative_deal_amount_is_invalid() {
        let req = ConvertLeadRequest {
            create_deal: true,
            deal_amount: Some(-1.0),
            ..Default::default()
        };
        assert!(req.validate().is_err());
    }
}
