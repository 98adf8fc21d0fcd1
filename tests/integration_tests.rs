use edilkamin::auth::CognitoClient;
use edilkamin::{Error, EdilkaminClient, Power};
use serde_json::{json, Value};
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MAC: &str = "AA:BB:CC:DD:EE:FF";
const INFO_PATH: &str = "/device/aabbccddeeff/info";

fn device_info_fixture() -> Value {
    serde_json::from_str(include_str!("fixtures/device_info.json")).unwrap()
}

fn authed_client(server: &MockServer) -> EdilkaminClient {
    EdilkaminClient::new_with_base_url(server.uri()).with_token("test-token")
}

async fn mount_device_info(server: &MockServer, body: Value) {
    Mock::given(method("GET"))
        .and(path(INFO_PATH))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_command(server: &MockServer, name: &str, value: Value) {
    Mock::given(method("PUT"))
        .and(path("/mqtt/command"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_json(json!({
            "mac_address": "aabbccddeeff",
            "name": name,
            "value": value,
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json("Command 0123456789abcdef executed successfully"),
        )
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_device_info_with_mock_server() {
    let mock_server = MockServer::start().await;
    mount_device_info(&mock_server, device_info_fixture()).await;

    let client = authed_client(&mock_server);
    let info = client.device_info(MAC).await.unwrap();

    assert_eq!(info.as_value(), &device_info_fixture());
    assert_eq!(info.power().unwrap(), Power::On);
    assert_eq!(info.serial_number().unwrap(), "EDK123456789");
}

#[tokio::test]
async fn test_device_info_decompresses_buffers() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(INFO_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(include_str!("fixtures/device_info_buffer.json")),
        )
        .mount(&mock_server)
        .await;

    let client = authed_client(&mock_server);
    let info = client.device_info(MAC).await.unwrap();

    // Same document as the plain fixture once decompressed.
    assert_eq!(info.as_value(), &device_info_fixture());
    assert_eq!(info.environment_temperature().unwrap(), 20.5);
}

#[tokio::test]
async fn test_device_info_unauthorized() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(INFO_PATH))
        .respond_with(
            ResponseTemplate::new(401).set_body_string(include_str!("fixtures/unauthorized.json")),
        )
        .mount(&mock_server)
        .await;

    let client = authed_client(&mock_server);
    match client.device_info(MAC).await {
        Err(Error::Api { status, message }) => {
            assert_eq!(status.as_u16(), 401);
            assert!(message.contains("Unauthorized"));
        }
        other => panic!("expected API error, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_requests_without_token_fail_locally() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = EdilkaminClient::new_with_base_url(mock_server.uri());
    let result = client.device_info(MAC).await;
    assert!(matches!(result, Err(Error::Auth(_))));
}

#[tokio::test]
async fn test_invalid_mac_is_rejected() {
    let mock_server = MockServer::start().await;
    let client = authed_client(&mock_server);
    let result = client.set_power_on("not-a-mac").await;
    assert!(matches!(result, Err(Error::InvalidMac(_))));
}

#[tokio::test]
async fn test_set_power_on_and_off() {
    let mock_server = MockServer::start().await;
    mount_command(&mock_server, "power", json!(1)).await;
    mount_command(&mock_server, "power", json!(0)).await;

    let client = authed_client(&mock_server);
    assert_eq!(
        client.set_power_on(MAC).await.unwrap(),
        "Command 0123456789abcdef executed successfully"
    );
    client.set_power_off(MAC).await.unwrap();
}

#[tokio::test]
async fn test_check_connection() {
    let mock_server = MockServer::start().await;
    mount_command(&mock_server, "check", json!("check")).await;

    let client = authed_client(&mock_server);
    client.check_connection(MAC).await.unwrap();
}

#[tokio::test]
async fn test_setters_send_expected_commands() {
    let mock_server = MockServer::start().await;
    mount_command(&mock_server, "enviroment_1_temperature", json!(22.5)).await;
    mount_command(&mock_server, "alarm_reset", json!(1)).await;
    mount_command(&mock_server, "cochlea_loading", json!(1)).await;
    mount_command(&mock_server, "airkare_function", json!(0)).await;
    mount_command(&mock_server, "relax_mode", json!(1)).await;
    mount_command(&mock_server, "power_level", json!(4)).await;
    mount_command(&mock_server, "chrono_mode", json!(1)).await;
    mount_command(&mock_server, "easytimer", json!(0)).await;

    let client = authed_client(&mock_server);
    client.set_target_temperature(MAC, 22.5).await.unwrap();
    client.reset_alarm(MAC).await.unwrap();
    client.set_perform_cochlea_loading(MAC, true).await.unwrap();
    client.set_airkare(MAC, false).await.unwrap();
    client.set_relax_mode(MAC, true).await.unwrap();
    client.set_manual_power_level(MAC, 4).await.unwrap();
    client.set_chrono_mode(MAC, true).await.unwrap();
    client.set_easy_timer(MAC, false).await.unwrap();
}

#[tokio::test]
async fn test_getters_read_device_info() {
    let mock_server = MockServer::start().await;
    mount_device_info(&mock_server, device_info_fixture()).await;

    let client = authed_client(&mock_server);
    assert_eq!(client.get_power(MAC).await.unwrap(), Power::On);
    assert_eq!(client.get_environment_temperature(MAC).await.unwrap(), 20.5);
    assert_eq!(client.get_target_temperature(MAC).await.unwrap(), 21.0);
    assert!(!client.get_alarm_reset(MAC).await.unwrap());
    assert!(!client.get_perform_cochlea_loading(MAC).await.unwrap());
    assert_eq!(client.get_fan_speed(MAC, 1).await.unwrap(), 3);
    assert_eq!(client.get_fan_speed(MAC, 2).await.unwrap(), 0);
    assert!(!client.get_airkare(MAC).await.unwrap());
    assert!(client.get_relax_mode(MAC).await.unwrap());
    assert_eq!(client.get_manual_power_level(MAC).await.unwrap(), 3);
    assert!(!client.get_standby_mode(MAC).await.unwrap());
    assert!(!client.get_chrono_mode(MAC).await.unwrap());
    assert_eq!(client.get_easy_timer(MAC).await.unwrap(), 45);
    assert_eq!(client.get_autonomy_time(MAC).await.unwrap(), 900);
    assert!(!client.get_pellet_reserve(MAC).await.unwrap());
    assert_eq!(client.get_serial_number(MAC).await.unwrap(), "EDK123456789");
}

#[tokio::test]
async fn test_set_fan_speed_on_installed_fan() {
    let mock_server = MockServer::start().await;
    mount_device_info(&mock_server, device_info_fixture()).await;
    mount_command(&mock_server, "fan_1_speed", json!(5)).await;

    let client = authed_client(&mock_server);
    let result = client.set_fan_speed(MAC, 1, 5).await.unwrap();
    assert!(result.is_some());
}

#[tokio::test]
async fn test_set_fan_speed_on_missing_fan_sends_nothing() {
    let mock_server = MockServer::start().await;
    mount_device_info(&mock_server, device_info_fixture()).await;
    Mock::given(method("PUT"))
        .and(path("/mqtt/command"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = authed_client(&mock_server);
    assert_eq!(client.set_fan_speed(MAC, 2, 5).await.unwrap(), None);
}

#[tokio::test]
async fn test_set_standby_mode_in_auto_mode() {
    let mock_server = MockServer::start().await;
    mount_device_info(&mock_server, device_info_fixture()).await;
    mount_command(&mock_server, "standby_mode", json!(1)).await;

    let client = authed_client(&mock_server);
    assert!(client.set_standby_mode(MAC, true).await.unwrap().is_some());
}

#[tokio::test]
async fn test_set_standby_mode_outside_auto_mode_sends_nothing() {
    let mock_server = MockServer::start().await;
    let mut info = device_info_fixture();
    *info.pointer_mut("/nvm/user_parameters/is_auto").unwrap() = json!(false);
    mount_device_info(&mock_server, info).await;
    Mock::given(method("PUT"))
        .and(path("/mqtt/command"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = authed_client(&mock_server);
    assert_eq!(client.set_standby_mode(MAC, true).await.unwrap(), None);
}

#[tokio::test]
async fn test_command_failure() {
    let mock_server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/mqtt/command"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&mock_server)
        .await;

    let client = authed_client(&mock_server);
    let result = client.set_power_off(MAC).await;
    assert!(matches!(result, Err(Error::Api { status, .. }) if status.as_u16() == 500));
}

async fn mount_cognito_sign_in(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/"))
        .and(header(
            "x-amz-target",
            "AWSCognitoIdentityProviderService.InitiateAuth",
        ))
        .and(header("content-type", "application/x-amz-json-1.1"))
        .and(body_partial_json(json!({
            "AuthFlow": "USER_SRP_AUTH",
            "AuthParameters": { "USERNAME": "user@example.com" },
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(include_str!("fixtures/cognito_challenge.json")),
        )
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/"))
        .and(header(
            "x-amz-target",
            "AWSCognitoIdentityProviderService.RespondToAuthChallenge",
        ))
        .and(body_partial_json(json!({
            "ChallengeName": "PASSWORD_VERIFIER",
            "ChallengeResponses": {
                "USERNAME": "user-id-123",
                "PASSWORD_CLAIM_SECRET_BLOCK": "c2VjcmV0LWJsb2NrLWJ5dGVz",
            },
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(include_str!("fixtures/cognito_auth_result.json")),
        )
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_sign_in_flow_with_mock_server() {
    let mock_server = MockServer::start().await;
    mount_cognito_sign_in(&mock_server).await;

    let mut client = EdilkaminClient::new_with_base_url(mock_server.uri())
        .with_cognito(CognitoClient::new_with_endpoint(mock_server.uri()));
    let tokens = client
        .sign_in("user@example.com", "correct horse")
        .await
        .unwrap();

    assert_eq!(tokens.access_token, "access-token-abc");
    assert_eq!(tokens.id_token, "id-token-xyz");
    assert_eq!(tokens.refresh_token.as_deref(), Some("refresh-token-123"));
    // The current API authenticates with the ID token.
    assert_eq!(client.access_token().as_deref(), Some("id-token-xyz"));
}

#[tokio::test]
async fn test_legacy_sign_in_uses_access_token() {
    let mock_server = MockServer::start().await;
    mount_cognito_sign_in(&mock_server).await;

    let mut client = EdilkaminClient::with_http_client(
        reqwest::Client::new(),
        mock_server.uri(),
        true,
    )
    .with_cognito(CognitoClient::new_with_endpoint(mock_server.uri()));
    client
        .sign_in("user@example.com", "correct horse")
        .await
        .unwrap();

    assert_eq!(client.access_token().as_deref(), Some("access-token-abc"));
}

#[tokio::test]
async fn test_sign_in_failure() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_string(include_str!("fixtures/cognito_not_authorized.json")),
        )
        .mount(&mock_server)
        .await;

    let mut client = EdilkaminClient::new_with_base_url(mock_server.uri())
        .with_cognito(CognitoClient::new_with_endpoint(mock_server.uri()));
    let result = client.sign_in("user@example.com", "wrong").await;

    match result {
        Err(Error::Auth(message)) => {
            assert!(message.contains("NotAuthorizedException"));
            assert!(message.contains("Incorrect username or password."));
        }
        other => panic!("expected auth error, got {:?}", other),
    }
    assert!(client.access_token().is_none());
}

#[tokio::test]
async fn test_refresh_with_mock_server() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(header(
            "x-amz-target",
            "AWSCognitoIdentityProviderService.InitiateAuth",
        ))
        .and(body_partial_json(json!({
            "AuthFlow": "REFRESH_TOKEN_AUTH",
            "AuthParameters": { "REFRESH_TOKEN": "refresh-token-123" },
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(include_str!("fixtures/cognito_refresh_result.json")),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut client = EdilkaminClient::new_with_base_url(mock_server.uri())
        .with_cognito(CognitoClient::new_with_endpoint(mock_server.uri()));
    let tokens = client.refresh("refresh-token-123").await.unwrap();

    assert_eq!(tokens.id_token, "id-token-new");
    assert_eq!(tokens.refresh_token.as_deref(), Some("refresh-token-123"));
    assert_eq!(client.access_token().as_deref(), Some("id-token-new"));
}

#[test]
fn test_blocking_client_outside_runtime() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mock_server = runtime.block_on(async {
        let server = MockServer::start().await;
        mount_device_info(&server, device_info_fixture()).await;
        mount_command(&server, "power", json!(1)).await;
        server
    });

    let client = edilkamin::blocking::EdilkaminClient::new_with_base_url(mock_server.uri())
        .unwrap()
        .with_token("test-token");
    assert_eq!(client.get_power(MAC).unwrap(), Power::On);
    assert_eq!(client.get_fan_speed(MAC, 1).unwrap(), 3);
    client.set_power_on(MAC).unwrap();

    drop(mock_server);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocking_client_inside_runtime() {
    let mock_server = MockServer::start().await;
    mount_device_info(&mock_server, device_info_fixture()).await;

    let client = edilkamin::blocking::EdilkaminClient::new_with_base_url(mock_server.uri())
        .unwrap()
        .with_token("test-token");
    assert_eq!(client.get_target_temperature(MAC).unwrap(), 21.0);
    assert_eq!(client.get_serial_number(MAC).unwrap(), "EDK123456789");
}
