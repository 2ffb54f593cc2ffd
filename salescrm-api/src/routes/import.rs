/// CSV bulk import
///
/// ```text
/// POST /v1/import/:entity            multipart, field "file"
/// GET  /v1/import/:entity/template   header-only CSV
/// ```
///
/// `entity` is one of `accounts`, `contacts`, `leads`, `products`. Imported
/// records are owned by the caller. Rows that fail validation or insertion
/// are reported back with their row number; the remaining rows still land.

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension,
};
use salescrm_shared::auth::{
    authorization::{Action, Module},
    middleware::AuthContext,
};
use salescrm_shared::import::{self, ImportEntity, ImportReport};
use salescrm_shared::models::activity_log::LogAction;
use serde_json::json;

use crate::{
    access::{log_activity, permit},
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ApiPath,
    response::ApiResponse,
};

const FILE_FIELD: &str = "file";

fn module_for(entity: ImportEntity) -> Module {
    match entity {
        ImportEntity::Accounts => Module::Accounts,
        ImportEntity::Contacts => Module::Contacts,
        ImportEntity::Leads => Module::Leads,
        ImportEntity::Products => Module::Products,
    }
}

/// Reads the bytes of the `file` part, skipping any other fields
async fn read_file(mut multipart: Multipart) -> ApiResult<Vec<u8>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        if field.name() == Some(FILE_FIELD) {
            let bytes = field.bytes().await.map_err(|e| ApiError::BadRequest(e.body_text()))?;
            return Ok(bytes.to_vec());
        }
    }

    Err(ApiError::validation(FILE_FIELD, "A CSV file is required"))
}

pub async fn import_entity(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(raw): ApiPath<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<ApiResponse<ImportReport>> {
    let entity = ImportEntity::parse(&raw)?;
    permit(&state, &auth, module_for(entity), Action::Create).await?;

    let multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let data = read_file(multipart).await?;

    let report = import::import_csv(&state.db, auth.tenant_id, auth.user_id, entity, &data).await?;

    tracing::info!(
        tenant_id = %auth.tenant_id,
        entity = entity.as_str(),
        total = report.total_rows,
        imported = report.imported,
        failed = report.failed,
        "CSV import finished"
    );
    log_activity(
        &state,
        &auth,
        LogAction::Import,
        entity.as_str(),
        None,
        json!({ "totalRows": report.total_rows, "imported": report.imported, "failed": report.failed }),
    )
    .await;

    let message = format!("Imported {} of {} rows", report.imported, report.total_rows);
    Ok(ApiResponse::ok(report).message(message))
}

pub async fn download_template(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(raw): ApiPath<String>,
) -> ApiResult<Response> {
    let entity = ImportEntity::parse(&raw)?;
    permit(&state, &auth, module_for(entity), Action::Create).await?;

    let body = import::template(entity)?;
    let disposition = format!("attachment; filename=\"{}_template.csv\"", entity.as_str());

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_entity_maps_to_its_module() {
        assert_eq!(module_for(ImportEntity::Accounts), Module::Accounts);
        assert_eq!(module_for(ImportEntity::Contacts), Module::Contacts);
        assert_eq!(module_for(ImportEntity::Leads), Module::Leads);
        assert_eq!(module_for(ImportEntity::Products), Module::Products);
    }
}
