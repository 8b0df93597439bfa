// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    error::ErrorBody,
    models::{
        CityResponse, CountryResponse, IpResponse, RegisterWalletRequest, RevenueCatEvent, RevenueCatWebhook,
        ServerResponse, ServersByAddressRequest, VersionResponse,
    },
    state::AppState,
};

pub mod health;
pub mod ip;
pub mod vpn;
pub mod wallet;

pub fn router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/health", get(health::health))
        .route("/version", get(health::version))
        .route("/countries", get(vpn::list_countries))
        .route("/countries/{country_id}/cities", get(vpn::list_cities))
        .route(
            "/countries/{country_id}/cities/{city_id}/servers",
            get(vpn::list_servers),
        )
        .route("/servers", post(vpn::servers_by_address))
        .route("/ip", get(ip::ip_location))
        .route("/wallet", post(wallet::register_wallet))
        .route("/webhooks/revenuecat", post(wallet::revenuecat_webhook))
        .with_state(state);

    Router::new()
        .merge(routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::version,
        vpn::list_countries,
        vpn::list_cities,
        vpn::list_servers,
        vpn::servers_by_address,
        ip::ip_location,
        wallet::register_wallet,
        wallet::revenuecat_webhook
    ),
    components(
        schemas(
            ErrorBody,
            VersionResponse,
            CountryResponse,
            CityResponse,
            ServerResponse,
            ServersByAddressRequest,
            IpResponse,
            RegisterWalletRequest,
            RevenueCatWebhook,
            RevenueCatEvent
        )
    ),
    tags(
        (name = "Health", description = "Liveness and client versions"),
        (name = "Directory", description = "Countries, cities, VPN servers and caller location"),
        (name = "Wallet", description = "Wallet registration and purchases")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use std::{net::SocketAddr, sync::Arc};

    use axum::{
        body::{to_bytes, Body},
        extract::ConnectInfo,
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::config::{ApiSettings, Environment};
    use crate::storage::database::tests::temp_db;
    use crate::storage::repository::geo::tests::seeds;
    use crate::storage::repository::networks::tests::network_seeds;
    use crate::storage::repository::servers::tests::sample_draft;
    use crate::storage::repository::wallets::tests::wallet_address;
    use crate::storage::{
        Database, GeoRepository, NetworkRepository, PurchaseRepository, ServerProtocol,
        ServerRepository, WalletRepository,
    };

    const WEBHOOK_AUTH: &str = "Bearer webhook-secret";

    fn settings(environment: Environment) -> ApiSettings {
        ApiSettings {
            environment,
            fee_granter_address: wallet_address(999),
            default_denom: "udvpn".into(),
            revenuecat_auth: WEBHOOK_AUTH.into(),
            last_ios_version: "1.4.0".into(),
            last_android_version: "1.5.2".into(),
        }
    }

    fn test_app(environment: Environment) -> (Router, Arc<Database>, tempfile::TempDir) {
        let (db, dir) = temp_db();
        GeoRepository::new(&db).seed_countries(&seeds()).unwrap();
        let db = Arc::new(db);
        let app = router(AppState::new(db.clone(), settings(environment)));
        (app, db, dir)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn webhook(auth: Option<&str>, event_id: &str, product_id: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/webhooks/revenuecat")
            .header("content-type", "application/json");
        if let Some(auth) = auth {
            builder = builder.header("authorization", auth);
        }
        let body = json!({
            "event": {
                "id": event_id,
                "environment": "PRODUCTION",
                "product_id": product_id,
                "app_user_id": wallet_address(1).to_uppercase(),
            }
        });
        builder.body(Body::from(body.to_string())).unwrap()
    }

    /// Berlin (2 servers, one busy), Munich (1), plus a stale Vienna server.
    fn populate(db: &Database) {
        let geo = GeoRepository::new(db);
        let (berlin, _) = geo.resolve_city(1, "Berlin").unwrap();
        let (munich, _) = geo.resolve_city(1, "Munich").unwrap();
        let (vienna, _) = geo.resolve_city(3, "Vienna").unwrap();

        let servers = ServerRepository::new(db);
        let place = |address: &str,
                     country_id: u64,
                     city_id: u64,
                     load: f64,
                     protocol: ServerProtocol| {
            let mut draft = sample_draft(address);
            draft.country_id = country_id;
            draft.city_id = city_id;
            draft.current_load = load;
            draft.protocol = protocol;
            draft
        };
        let wg = ServerProtocol::WireGuard;
        servers.upsert(&place("b-low", 1, berlin.id, 0.1, wg), 2).unwrap();
        servers
            .upsert(&place("b-high", 1, berlin.id, 0.9, ServerProtocol::V2Ray), 2)
            .unwrap();
        servers.upsert(&place("m-1", 1, munich.id, 0.5, wg), 2).unwrap();
        servers.upsert(&place("v-1", 3, vienna.id, 0.5, wg), 1).unwrap();
        servers.deactivate_stale(2).unwrap();
    }

    #[tokio::test]
    async fn health_and_version() {
        let (app, _db, _dir) = test_app(Environment::Development);

        let (status, body) = send(&app, get_req("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({}));

        let (status, body) = send(&app, get_req("/version")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"data": {"ios": "1.4.0", "android": "1.5.2"}}));
    }

    #[tokio::test]
    async fn countries_and_cities_list_only_available_servers() {
        let (app, db, _dir) = test_app(Environment::Development);
        populate(&db);

        let (status, body) = send(&app, get_req("/countries")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["data"],
            json!([{"id": 1, "name": "Germany", "code": "DE", "servers_available": 3}])
        );

        let (_, body) = send(&app, get_req("/countries?protocol=V2RAY")).await;
        assert_eq!(body["data"][0]["servers_available"], 1);

        let (status, body) = send(&app, get_req("/countries/1/cities")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["name"], "Berlin");
        assert_eq!(body["data"][0]["servers_available"], 2);
        assert_eq!(body["data"][1]["name"], "Munich");

        let (status, body) = send(&app, get_req("/countries/3/cities")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], json!([]));
    }

    #[tokio::test]
    async fn cities_errors() {
        let (app, _db, _dir) = test_app(Environment::Development);

        let (status, body) = send(&app, get_req("/countries/abc/cities")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalidRequest");

        let (status, body) = send(&app, get_req("/countries/42/cities")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "notFound");

        let (status, _) = send(&app, get_req("/countries?protocol=OPENVPN")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn servers_sorted_by_load_and_filtered() {
        let (app, db, _dir) = test_app(Environment::Development);
        populate(&db);
        let berlin = GeoRepository::new(&db).find_city(1, "Berlin").unwrap().unwrap();

        let uri = format!("/countries/1/cities/{}/servers?sortBy=CURRENT_LOAD", berlin.id);
        let (status, body) = send(&app, get_req(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        let addresses: Vec<&str> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["address"].as_str().unwrap())
            .collect();
        assert_eq!(addresses, vec!["b-high", "b-low"]);
        assert_eq!(body["data"][0]["protocol"], "V2RAY");
        assert_eq!(body["data"][0]["is_available"], true);

        let uri = format!("/countries/1/cities/{}/servers?protocol=WIREGUARD&limit=5", berlin.id);
        let (_, body) = send(&app, get_req(&uri)).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let uri = format!("/countries/1/cities/{}/servers?sortBy=NAME", berlin.id);
        let (status, body) = send(&app, get_req(&uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "invalidRequest", "reason": "invalid sortBy"}));
    }

    #[tokio::test]
    async fn servers_by_address_includes_inactive() {
        let (app, db, _dir) = test_app(Environment::Development);
        populate(&db);

        let (status, body) =
            send(&app, post_json("/servers", json!({"addresses": ["v-1", "m-1", "nope"]}))).await;
        assert_eq!(status, StatusCode::OK);
        let data = body["data"].as_array().unwrap();
        assert_eq!(data.len(), 2);
        let stale = data.iter().find(|s| s["address"] == "v-1").unwrap();
        assert_eq!(stale["is_available"], false);

        let (status, _) = send(&app, post_json("/servers", json!({"addr": 1}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn wallet_registration_is_idempotent() {
        let (app, db, _dir) = test_app(Environment::Development);
        let address = wallet_address(5).to_uppercase();

        for _ in 0..2 {
            let request = post_json("/wallet", json!({"address": address}));
            let (status, body) = send(&app, request).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, json!({}));
        }

        let wallets = WalletRepository::new(&db).list_pending(10).unwrap();
        assert_eq!(wallets.len(), 1);
        assert_eq!(wallets[0].address, wallet_address(5));
    }

    #[tokio::test]
    async fn wallet_registration_rejects_bad_addresses() {
        let (app, _db, _dir) = test_app(Environment::Development);

        let request = post_json("/wallet", json!({"address": "sent1short"}));
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["reason"], "invalid wallet address");

        let granter = wallet_address(999);
        let (status, _) = send(&app, post_json("/wallet", json!({"address": granter}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn production_errors_omit_reason() {
        let (app, _db, _dir) = test_app(Environment::Production);
        let (status, body) = send(&app, post_json("/wallet", json!({"address": "x"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "invalidRequest"}));
    }

    #[tokio::test]
    async fn duplicate_webhook_creates_one_purchase() {
        let (app, db, _dir) = test_app(Environment::Development);

        for _ in 0..2 {
            let (status, _) = send(
                &app,
                webhook(Some(WEBHOOK_AUTH), "evt-1", "sentinel_dvpn_10000"),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        let purchases = PurchaseRepository::new(&db).list_unredeemed(10).unwrap();
        assert_eq!(purchases.len(), 1);
        assert_eq!(purchases[0].amount, 10_000_000_000);
        assert_eq!(purchases[0].denom, "udvpn");
        assert_eq!(purchases[0].address, wallet_address(1));
    }

    #[tokio::test]
    async fn webhook_validation() {
        let (app, db, _dir) = test_app(Environment::Development);

        let (status, body) = send(&app, webhook(None, "evt-1", "sentinel_dvpn_5000")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["reason"], "invalid authorization header");

        let (_, body) = send(&app, webhook(Some("wrong"), "evt-1", "sentinel_dvpn_5000")).await;
        assert_eq!(body["reason"], "invalid authorization header");

        let (_, body) = send(&app, webhook(Some(WEBHOOK_AUTH), "", "sentinel_dvpn_5000")).await;
        assert_eq!(body["reason"], "invalid event id");

        let (_, body) = send(&app, webhook(Some(WEBHOOK_AUTH), "evt-1", "gold_pack")).await;
        assert_eq!(body["reason"], "invalid product id");

        assert!(PurchaseRepository::new(&db).list_unredeemed(10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn webhook_trims_padded_wallet_address() {
        let (app, db, _dir) = test_app(Environment::Development);
        let body = json!({
            "event": {
                "id": "evt-padded",
                "environment": "PRODUCTION",
                "product_id": "sentinel_dvpn_5000",
                "app_user_id": format!("  {}\n", wallet_address(1)),
            }
        });
        let req = Request::builder()
            .method("POST")
            .uri("/webhooks/revenuecat")
            .header("content-type", "application/json")
            .header("authorization", WEBHOOK_AUTH)
            .body(Body::from(body.to_string()))
            .unwrap();

        let (status, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        let purchase = PurchaseRepository::new(&db).find("evt-padded").unwrap().unwrap();
        assert_eq!(purchase.address, wallet_address(1));
    }

    fn ip_req(headers: &[(&str, &str)], peer: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/ip");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let mut req = builder.body(Body::empty()).unwrap();
        if let Some(peer) = peer {
            let addr: SocketAddr = peer.parse().unwrap();
            req.extensions_mut().insert(ConnectInfo(addr));
        }
        req
    }

    #[tokio::test]
    async fn ip_location_by_header_and_peer() {
        let (app, db, _dir) = test_app(Environment::Development);
        NetworkRepository::new(&db)
            .seed_networks(&network_seeds())
            .unwrap();

        let (status, body) = send(
            &app,
            ip_req(
                &[
                    ("CF-Connecting-IP", "81.2.69.142"),
                    ("X-Forwarded-For", "145.100.1.1"),
                ],
                Some("10.0.0.9:5123"),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["data"],
            json!({"ip": "81.2.69.142", "latitude": 52.52, "longitude": 13.40})
        );

        let (_, body) = send(
            &app,
            ip_req(&[("X-Forwarded-For", "145.100.1.1, 81.2.69.142")], None),
        )
        .await;
        assert_eq!(body["data"]["ip"], "145.100.1.1");
        assert_eq!(body["data"]["longitude"], 4.90);

        let (_, body) = send(&app, ip_req(&[], Some("[::ffff:81.2.7.7]:443"))).await;
        assert_eq!(body["data"]["ip"], "81.2.7.7");
        assert_eq!(body["data"]["latitude"], 50.11);
    }

    #[tokio::test]
    async fn ip_location_without_match_is_unknown_error() {
        let (app, db, _dir) = test_app(Environment::Development);
        NetworkRepository::new(&db)
            .seed_networks(&network_seeds())
            .unwrap();

        let (status, body) = send(&app, ip_req(&[("CF-Connecting-IP", "8.8.8.8")], None)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "unknownError");
        assert_eq!(body["reason"], "failed to find matching IP range for 8.8.8.8");

        let (status, body) = send(&app, ip_req(&[("CF-Connecting-IP", "garbage")], None)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["reason"], "failed to get IP address");

        let (_, body) = send(&app, ip_req(&[], None)).await;
        assert_eq!(body["error"], "unknownError");
    }

    #[tokio::test]
    async fn openapi_document_is_served() {
        let (app, _db, _dir) = test_app(Environment::Development);
        let (status, body) = send(&app, get_req("/api-doc/openapi.json")).await;
        assert_eq!(status, StatusCode::OK);
        let paths = body["paths"].as_object().unwrap();
        assert!(paths.contains_key("/countries/{country_id}/cities/{city_id}/servers"));
        assert!(paths.contains_key("/ip"));
    }
}
