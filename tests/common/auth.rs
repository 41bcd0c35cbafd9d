use elearn_backend::auth::sign_jwt_for_user;

use super::app::TestApp;

/// Identity is external to this service; a signed token is all a request
/// needs.
pub fn token_for(app: &TestApp, user_id: &str) -> String {
    sign_jwt_for_user(user_id, &app.config.jwt_secret, 1).expect("sign test jwt")
}

pub fn auth_header(token: &str) -> String {
    format!("Bearer {token}")
}
