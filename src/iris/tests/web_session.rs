// Copyright 2026 The asc-rs Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use asc_client::diagnostics::Capture;
use asc_iris::client::{AppCreateAttributes, IrisClient};
use asc_iris::login::{Endpoints, LoginOutcome, WebAuth};
use asc_iris::session_cache::SessionCache;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use httptest::{Expectation, Server, matchers::*, responders::*};
use serde_json::json;

fn endpoints(server: &Server) -> Endpoints {
    let root = format!("http://{}", server.addr());
    Endpoints::default()
        .with_auth_service(format!("{root}/appleauth/auth"))
        .with_app_store(root.clone())
        .with_sign_in(root)
}

fn expect_sign_in(server: &Server) {
    server.expect(
        Expectation::matching(request::method_path("GET", "/olympus/v1/app/config"))
            .respond_with(json_encoded(json!({"authServiceKey": "widget-key"}))),
    );
    server.expect(
        Expectation::matching(request::method_path("POST", "/appleauth/auth/signin/init"))
            .respond_with(json_encoded(json!({
                "iteration": 10,
                "salt": STANDARD.encode(b"salt"),
                "protocol": "s2k",
                "b": STANDARD.encode([7_u8; 256]),
                "c": "challenge",
            }))),
    );
    server.expect(
        Expectation::matching(request::method_path("GET", "/appleauth/auth/signin")).respond_with(
            status_code(200)
                .insert_header("X-Apple-HC-Bits", "1")
                .insert_header("X-Apple-HC-Challenge", "c0ffee"),
        ),
    );
    server.expect(
        Expectation::matching(request::method_path("POST", "/appleauth/auth/signin/complete"))
            .respond_with(
                status_code(409)
                    .insert_header("X-Apple-ID-Session-Id", "sid")
                    .insert_header("scnt", "scnt")
                    .insert_header("set-cookie", "aasp=pending; Path=/"),
            ),
    );
    server.expect(
        Expectation::matching(request::method_path("GET", "/appleauth/auth"))
            .respond_with(json_encoded(json!({"trustedDevices": [{"id": 1}]}))),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method_path("POST", "/appleauth/auth/verify/trusteddevice/securitycode"),
            request::body(json_decoded(eq(json!({"securityCode": {"code": "246810"}})))),
        ])
        .respond_with(status_code(204)),
    );
    server.expect(
        Expectation::matching(request::method_path("GET", "/appleauth/auth/2sv/trust")).respond_with(
            status_code(204).insert_header("set-cookie", "myacinfo=web-token; Path=/; HttpOnly"),
        ),
    );
}

#[tokio::test]
async fn sign_in_persist_resume_and_create_app() -> anyhow::Result<()> {
    let server = Server::run();
    expect_sign_in(&server);
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/olympus/v1/session"),
            request::headers(contains(("cookie", matches("myacinfo=web-token")))),
        ])
        .times(2)
        .respond_with(json_encoded(json!({
            "provider": {"providerId": 1234, "name": "Example"},
            "user": {"emailAddress": "dev@example.com"},
        }))),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method_path("POST", "/iris/v1/apps"),
            request::headers(contains(("cookie", matches("myacinfo=web-token")))),
        ])
        .respond_with(json_encoded(json!({"data": {"id": "987", "type": "apps"}}))),
    );

    let auth = WebAuth::with_endpoints(endpoints(&server));
    let mut session = match auth.login("dev@example.com", "hunter2").await? {
        LoginOutcome::TwoFactorRequired(session, _) => session,
        other => anyhow::bail!("expected a two-factor challenge: {other:?}"),
    };
    session.submit_two_factor_code("246810").await?;
    assert_eq!(session.provider_id, Some(1234));

    let tmp = tempfile::tempdir()?;
    let capture = Capture::new();
    let cache = SessionCache::new(tmp.path())
        .with_endpoints(endpoints(&server))
        .with_diagnostics(capture.clone());
    cache.persist(&session).await?;
    drop(session);

    let resumed = cache.resume("dev@example.com").await;
    let resumed = resumed.ok_or_else(|| anyhow::anyhow!("expected a cached session"))?;
    assert_eq!(resumed.team_id.as_deref(), Some("1234"));
    assert!(capture.lines().is_empty(), "{:?}", capture.lines());

    let client = IrisClient::new(&resumed)?;
    let app = client
        .create_app(AppCreateAttributes::new("com.example.app").with_name("Example"))
        .await?;
    assert_eq!(app.id, "987");
    Ok(())
}
