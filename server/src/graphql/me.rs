use async_graphql::SimpleObject;
use platform_authn::User;
use platform_authz::DenialList;

/// The signed-in profile together with what its role may not open.
#[derive(Clone, Debug, SimpleObject)]
pub struct MePayload {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub role: Option<String>,
    pub denied_menu_ids: Vec<String>,
}

impl MePayload {
    pub fn from_user(user: &User, denied: &DenialList) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role.clone(),
            denied_menu_ids: denied.menu_ids(),
        }
    }
}
