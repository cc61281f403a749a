//! Dynamic option loaders for selection fields.

use serde_json::{json, Map, Value};
use tracing::{debug, instrument};

use crate::description::PropertyOption;
use crate::error::{NodeError, OperationError};

use super::request::{ApiClient, ApiRequest};
use super::response::handle_api_error;

/// A TrackingTime account the credentials have access to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub account_id: String,
    pub company: Option<String>,
}

impl Account {
    fn from_record(record: &Value) -> Option<Self> {
        let account_id = match record.get("account_id")? {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        let company = record
            .get("company")
            .and_then(Value::as_str)
            .map(str::to_owned);
        Some(Self { account_id, company })
    }

    pub fn to_option(&self) -> PropertyOption {
        let label = self.company.clone().unwrap_or_else(|| self.account_id.clone());
        PropertyOption::new(label, self.account_id.clone())
    }
}

/// Records under `data` with a usable `account_id`.
pub fn accounts_from_response(response: &Value) -> Vec<Account> {
    response
        .get("data")
        .and_then(Value::as_array)
        .map(|records| records.iter().filter_map(Account::from_record).collect())
        .unwrap_or_default()
}

/// `getAccounts`: one option per account, labelled with the company name.
///
/// # Errors
/// Fails when the remote call fails or no account is usable; account
/// selection cannot proceed without one.
#[instrument(skip(client))]
pub async fn get_accounts(client: &ApiClient<'_>, only_active: bool) -> Result<Vec<PropertyOption>, NodeError> {
    let mut query = Map::new();
    if only_active {
        query.insert("filter".into(), json!("ACTIVE"));
    }
    let request = ApiRequest::get("teams")
        .query(query)
        .header("Accept", "application/json");
    let label = request.label();

    let response = client
        .request(request)
        .await
        .map_err(|e| handle_api_error(e, &label))?;

    let accounts = accounts_from_response(&response);
    debug!(count = accounts.len(), "loaded accounts");

    if accounts.is_empty() {
        return Err(OperationError::new("No TrackingTime accounts were found for these credentials.")
            .with_description("Check that the user belongs to at least one active account.")
            .into());
    }

    Ok(accounts.iter().map(Account::to_option).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockHelper;

    #[tokio::test]
    async fn one_option_per_account_with_id() {
        let helper = MockHelper::returning(json!({"data": [
            {"account_id": 10, "company": "Acme"},
            {"account_id": "11"},
            {"account_id": null, "company": "Ghost"},
            {"company": "No id"},
        ]}));
        let client = ApiClient::new(&helper, "https://host");

        let options = get_accounts(&client, true).await.unwrap();
        assert_eq!(
            options,
            vec![PropertyOption::new("Acme", "10"), PropertyOption::new("11", "11")]
        );

        let request = helper.call(0);
        assert_eq!(request.url, "https://host/teams");
        assert_eq!(request.query_param("filter"), Some(&json!("ACTIVE")));
    }

    #[tokio::test]
    async fn all_accounts_without_filter_when_not_restricted() {
        let helper = MockHelper::returning(json!({"data": [{"account_id": 1}]}));
        let client = ApiClient::new(&helper, "https://host");

        get_accounts(&client, false).await.unwrap();
        assert!(helper.call(0).qs.is_none());
    }

    #[tokio::test]
    async fn empty_or_id_less_result_is_fatal() {
        for body in [json!({"data": []}), json!({"data": [{"account_id": null}]}), json!({})] {
            let helper = MockHelper::returning(body);
            let client = ApiClient::new(&helper, "https://host");
            let err = get_accounts(&client, true).await.unwrap_err();
            assert!(err.to_string().contains("No TrackingTime accounts"));
        }
    }

    #[tokio::test]
    async fn remote_failure_is_labelled() {
        let helper = MockHelper::failing(401, r#"{"message":"Bad credentials"}"#);
        let client = ApiClient::new(&helper, "https://host");
        let err = get_accounts(&client, true).await.unwrap_err();
        assert_eq!(err.to_string(), "GET /teams: Bad credentials");
    }
}
