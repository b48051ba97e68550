use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::StatusCode,
    Json,
};
use serde::{de::DeserializeOwned, Deserialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SignInSchema {
    #[validate(length(min = 1, max = 128))]
    pub user_id: String,
    #[validate(length(min = 1, max = 128))]
    pub display_name: String,
    #[validate(length(max = 512))]
    #[serde(default)]
    pub avatar: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateProfileSchema {
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    #[validate(length(max = 512))]
    #[serde(default)]
    pub avatar: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewRoomSchema {
    #[validate(length(min = 1, max = 128))]
    pub title: String,
    #[validate(length(max = 128))]
    #[serde(default)]
    pub topic: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MuteSchema {
    pub is_muted: bool,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MessageSchema {
    #[validate(length(min = 1, max = 500))]
    pub text: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GiftSchema {
    #[validate(length(min = 1, max = 64))]
    pub gift_id: String,
    #[validate(range(min = 1, max = 999))]
    #[serde(default = "default_gift_amount")]
    pub amount: u32,
}

fn default_gift_amount() -> u32 {
    1
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RechargeSchema {
    #[validate(range(min = 1))]
    pub amount: i64,
}

pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let extracted_json: Json<T> = Json::from_request(req, state)
            .await
            .map_err(|_| (StatusCode::BAD_REQUEST, "JSON parse failed"))?;

        extracted_json
            .0
            .validate()
            .map_err(|_| (StatusCode::BAD_REQUEST, "Request body is invalid"))?;

        Ok(Self(extracted_json.0))
    }
}
