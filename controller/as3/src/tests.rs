use crate::{
    declaration::{Object, Pointer, APPLICATION},
    *,
};
use base64::Engine;
use maplit::{btreemap, convert_args};
use serde_json::json;
use std::{collections::BTreeMap, time::Duration};
use tgw_controller_core::{
    mailbox, DownstreamService, GatewayIdentity, Instance, LeafCertificate, RootCertificateSet,
    TopologySnapshot,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    time,
};

#[test]
fn compiles_payments_scenario() {
    let snapshot = snapshot(vec![service(
        "payments",
        vec![instance("i1", "10.0.1.10", 9000)],
        &["checkout"],
    )]);
    let req = Compiler::default().compile(&snapshot);

    assert_eq!(
        req.application().names().collect::<Vec<_>>(),
        vec![
            "TG_Vserver",
            "payments-pool",
            "cabundle",
            "webtls",
            "payments-cert",
            "SNIrouting",
            "intentionRule",
            "target-dg",
        ]
    );

    let value = serde_json::to_value(&req).unwrap();
    assert_eq!(value["$schema"], DEFAULT_SCHEMA);
    assert_eq!(value["class"], "AS3");
    assert_eq!(value["action"], "deploy");
    assert_eq!(value["persist"], true);
    assert_eq!(value["declaration"]["class"], "ADC");
    assert_eq!(value["declaration"]["schemaVersion"], DEFAULT_SCHEMA_VERSION);
    assert_eq!(
        value["declaration"]["controls"],
        json!({"class": "Controls", "userAgent": "TGW Configured AS3"})
    );

    let tenant = &value["declaration"][TENANT];
    assert_eq!(tenant["class"], "Tenant");
    assert_eq!(tenant["defaultRouteDomain"], 0);

    let app = &tenant[APPLICATION];
    assert_eq!(app["class"], "Application");
    assert_eq!(app["template"], "generic");
    assert_eq!(
        app["TG_Vserver"],
        json!({
            "class": "Service_TCP",
            "virtualAddresses": ["10.0.0.5"],
            "virtualPort": 8443,
            "serverTLS": "webtls",
            "policyEndpoint": "SNIrouting",
            "iRules": ["intentionRule"],
        })
    );
    assert_eq!(
        app["payments-pool"],
        json!({
            "class": "Pool",
            "label": "payments",
            "members": [{"servicePort": 9000, "serverAddresses": ["10.0.1.10"]}],
            "monitors": [],
        })
    );
    assert_eq!(
        app["payments-cert"],
        json!({
            "class": "Certificate",
            "certificate": "payments-CERT",
            "privateKey": "payments-KEY",
            "chainCA": "CA1-PEM",
        })
    );
    assert_eq!(app["cabundle"], json!({"class": "CA_Bundle", "bundle": "CA1-PEM"}));
    assert_eq!(
        app["webtls"],
        json!({
            "class": "TLS_Server",
            "label": "TLS Termination",
            "certificates": [{"certificate": "payments-cert"}],
            "authenticationMode": "require",
            "authenticationFrequency": "every-time",
            "authenticationTrustCA": "cabundle",
        })
    );
    assert_eq!(
        app["SNIrouting"]["rules"],
        json!([{
            "name": "forward_to_payments",
            "conditions": [{
                "type": "sslExtension",
                "event": "ssl-client-hello",
                "serverName": {
                    "operand": "starts-with",
                    "values": ["payments"],
                    "caseSensitive": false,
                },
                "normalized": false,
            }],
            "actions": [{
                "type": "forward",
                "event": "ssl-client-hello",
                "select": {"pool": {"use": "payments-pool"}},
            }],
        }])
    );
    assert_eq!(
        app["target-dg"]["records"],
        json!([
            {"key": "dummy", "value": "disallow"},
            {"key": "checkout:payments", "value": "allow"},
        ])
    );
    assert_eq!(app["intentionRule"]["class"], "iRule");
}

#[test]
fn rendered_body_preserves_member_order() {
    let snapshot = snapshot(vec![service(
        "payments",
        vec![instance("i1", "10.0.1.10", 9000)],
        &["checkout"],
    )]);
    let rendered = Compiler::default().compile(&snapshot).render().unwrap();

    assert!(rendered.body.starts_with(&format!(
        "{{\"$schema\":\"{DEFAULT_SCHEMA}\",\"class\":\"AS3\",\"action\":\"deploy\",\"persist\":true,"
    )));
    assert!(rendered.body.contains(
        "\"TerminatingGateway\":{\"class\":\"Application\",\"template\":\"generic\",\"TG_Vserver\":{\"class\":\"Service_TCP\""
    ));
    let pool = rendered.body.find("\"payments-pool\"").unwrap();
    let bundle = rendered.body.find("\"cabundle\":").unwrap();
    let group = rendered.body.find("\"target-dg\":").unwrap();
    assert!(pool < bundle && bundle < group);
}

#[test]
fn intention_rule_authorizes_with_the_data_group() {
    let req = Compiler::default().compile(&snapshot(vec![]));
    let rule = match req.application().get("intentionRule") {
        Some(Object::IRule(rule)) => rule,
        obj => panic!("unexpected object: {obj:?}"),
    };
    let encoded = match &rule.irule {
        Pointer::Base64(encoded) => encoded,
        ptr => panic!("unexpected pointer: {ptr:?}"),
    };
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .expect("rule must be valid base64");
    let text = String::from_utf8(decoded).unwrap();
    assert!(text.contains("target-dg"));
    assert!(text.contains("SSL::handshake resume"));
    assert!(text.contains("reject"));
}

#[test]
fn compilation_is_deterministic() {
    let snapshot = snapshot(vec![
        service("billing", vec![instance("b1", "10.0.2.1", 8080)], &["web"]),
        service(
            "payments",
            vec![
                instance("i1", "10.0.1.10", 9000),
                instance("i2", "10.0.1.11", 9000),
            ],
            &["checkout", "web"],
        ),
    ]);
    let compiler = Compiler::new("https://example.com/schema.json", "3.36.0");

    let a = compiler.compile(&snapshot).render().unwrap();
    let b = compiler.compile(&snapshot.clone()).render().unwrap();
    assert_eq!(a, b);

    let value = serde_json::to_value(&a.request).unwrap();
    assert_eq!(value["$schema"], "https://example.com/schema.json");
    assert_eq!(value["declaration"]["schemaVersion"], "3.36.0");
    assert_eq!(
        value["declaration"][TENANT][APPLICATION]["target-dg"]["records"],
        json!([
            {"key": "dummy", "value": "disallow"},
            {"key": "web:billing", "value": "allow"},
            {"key": "checkout:payments", "value": "allow"},
            {"key": "web:payments", "value": "allow"},
        ])
    );
}

#[test]
fn removing_a_service_removes_only_its_objects() {
    let payments = service(
        "payments",
        vec![instance("i1", "10.0.1.10", 9000)],
        &["checkout"],
    );
    let billing = service("billing", vec![instance("b1", "10.0.2.1", 8080)], &["web"]);
    let compiler = Compiler::default();

    let before = compiler.compile(&snapshot(vec![billing, payments.clone()]));
    let after = compiler.compile(&snapshot(vec![payments]));

    let names = after.application().names().collect::<Vec<_>>();
    assert!(!names.iter().any(|n| n.starts_with("billing")));
    for name in ["payments-pool", "payments-cert"] {
        assert_eq!(before.application().get(name), after.application().get(name));
    }
    assert_eq!(
        before.application().get("cabundle"),
        after.application().get("cabundle")
    );

    let value = serde_json::to_value(&after).unwrap();
    let app = &value["declaration"][TENANT][APPLICATION];
    assert_eq!(
        app["webtls"]["certificates"],
        json!([{"certificate": "payments-cert"}])
    );
    assert_eq!(app["SNIrouting"]["rules"].as_array().unwrap().len(), 1);

    assert_eq!(
        records(&before),
        convert_args!(btreemap!(
            "dummy" => "disallow",
            "checkout:payments" => "allow",
            "web:billing" => "allow",
        ))
    );
    assert_eq!(
        records(&after),
        convert_args!(btreemap!(
            "dummy" => "disallow",
            "checkout:payments" => "allow",
        ))
    );
}

#[test]
fn empty_topology_compiles_to_an_empty_application() {
    let req = Compiler::default().compile(&snapshot(vec![]));
    assert_eq!(
        req.application().names().collect::<Vec<_>>(),
        vec![
            "TG_Vserver",
            "cabundle",
            "webtls",
            "SNIrouting",
            "intentionRule",
            "target-dg",
        ]
    );

    let value = serde_json::to_value(&req).unwrap();
    let app = &value["declaration"][TENANT][APPLICATION];
    assert_eq!(app["webtls"]["certificates"], json!([]));
    assert_eq!(app["SNIrouting"]["rules"], json!([]));
    assert_eq!(
        app["target-dg"]["records"],
        json!([{"key": "dummy", "value": "disallow"}])
    );
    assert_eq!(app["cabundle"]["bundle"], "CA1-PEM");
}

#[test]
fn service_without_instances_has_an_empty_pool() {
    let req = Compiler::default().compile(&snapshot(vec![service("payments", vec![], &[])]));
    let value = serde_json::to_value(&req).unwrap();
    let app = &value["declaration"][TENANT][APPLICATION];
    assert_eq!(app["payments-pool"]["members"], json!([]));
    assert_eq!(
        app["target-dg"]["records"],
        json!([{"key": "dummy", "value": "disallow"}])
    );
}

#[test]
fn certificate_debug_omits_private_key() {
    let req = Compiler::default().compile(&snapshot(vec![service("payments", vec![], &[])]));
    let debug = format!("{:?}", req.application().get("payments-cert").unwrap());
    assert!(debug.contains("payments-CERT"));
    assert!(!debug.contains("payments-KEY"));
}

// === Agent ===

#[tokio::test]
async fn deploy_posts_the_declaration() {
    let (url, server) = serve(vec!["200 OK"]).await;
    let agent = agent(url);
    let rendered = Compiler::default()
        .compile(&snapshot(vec![]))
        .render()
        .unwrap();

    agent.deploy(&rendered).await.expect("deploy must succeed");

    let requests = server.await.unwrap();
    let (head, body) = requests[0].split_once("\r\n\r\n").unwrap();
    let head = head.to_lowercase();
    assert!(head.starts_with("post /mgmt/shared/appsvcs/declare http/1.1"), "{head}");
    // admin:secret
    assert!(head.contains("authorization: basic ywrtaw46c2vjcmv0"), "{head}");
    assert!(head.contains("content-type: application/json"), "{head}");
    assert_eq!(body, rendered.body);
}

#[tokio::test]
async fn deploy_reports_rejections() {
    let (url, server) = serve(vec!["422 Unprocessable Entity"]).await;
    let rendered = Compiler::default()
        .compile(&snapshot(vec![]))
        .render()
        .unwrap();

    let error = agent(url)
        .deploy(&rendered)
        .await
        .expect_err("deploy must fail");
    match error {
        agent::Error::Status { status, body } => {
            assert_eq!(status, reqwest::StatusCode::UNPROCESSABLE_ENTITY);
            assert_eq!(body, "declaration is invalid");
        }
        error => panic!("unexpected error: {error}"),
    }
    server.await.unwrap();
}

#[tokio::test]
async fn remove_tenant_deletes_the_partition() {
    let (url, server) = serve(vec!["200 OK"]).await;
    agent(url)
        .remove_tenant(TENANT)
        .await
        .expect("removal must succeed");

    let requests = server.await.unwrap();
    assert!(requests[0]
        .to_lowercase()
        .starts_with("delete /mgmt/shared/appsvcs/declare/tgw_tenant http/1.1"));
}

#[tokio::test]
async fn tenant_names_are_escaped_as_one_path_segment() {
    let (url, server) = serve(vec!["200 OK"]).await;
    agent(format!("{url}/"))
        .remove_tenant("a/b?c%")
        .await
        .expect("removal must succeed");

    let requests = server.await.unwrap();
    let request = requests[0].to_lowercase();
    assert!(
        request.starts_with("delete /mgmt/shared/appsvcs/declare/a%2fb%3fc%25 http/1.1"),
        "{request}"
    );
}

#[test]
fn rejects_an_unusable_url() {
    for url in ["10.0.0.1:8443", "mailto:admin@example.com"] {
        let error = Agent::new(agent_config(url.to_string()))
            .err()
            .expect("agent must not build");
        assert!(matches!(error, agent::Error::InvalidUrl(_)), "{url}: {error}");
    }
}

#[tokio::test]
async fn deploy_times_out_on_a_stalled_device() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let url = format!("http://{}", listener.local_addr().expect("local addr"));
    let server = tokio::spawn(async move {
        // Accept the request but never answer it.
        let (conn, _) = listener.accept().await.expect("accept");
        time::sleep(Duration::from_secs(30)).await;
        drop(conn);
    });

    let agent = Agent::new(AgentConfig {
        timeout: Duration::from_millis(100),
        ..agent_config(url)
    })
    .expect("agent must build");
    let rendered = Compiler::default()
        .compile(&snapshot(vec![]))
        .render()
        .unwrap();

    let error = time::timeout(Duration::from_secs(5), agent.deploy(&rendered))
        .await
        .expect("deploy must not hang")
        .expect_err("deploy must fail");
    assert!(
        matches!(&error, agent::Error::Transport(e) if e.is_timeout()),
        "{error}"
    );
    server.abort();
}

#[tokio::test]
async fn run_retries_failed_deployments() {
    let (url, server) = serve(vec!["503 Service Unavailable", "200 OK"]).await;
    let (tx, rx) = mailbox::channel();
    let agent = tokio::spawn(agent(url).run(rx));

    let rendered = Compiler::default()
        .compile(&snapshot(vec![]))
        .render()
        .unwrap();
    tx.offer(rendered.clone());

    let requests = time::timeout(Duration::from_secs(10), server)
        .await
        .expect("both requests must be served")
        .unwrap();
    for request in &requests {
        assert!(request.ends_with(&rendered.body));
    }

    drop(tx);
    time::timeout(Duration::from_secs(10), agent)
        .await
        .expect("agent must stop once the mailbox closes")
        .unwrap();
}

// === Fixtures ===

fn snapshot(services: Vec<DownstreamService>) -> TopologySnapshot {
    TopologySnapshot {
        gateway: GatewayIdentity {
            id: "tgw-1".to_string(),
            name: "tgw".to_string(),
            address: "10.0.0.5".to_string(),
            port: 8443,
        },
        roots: RootCertificateSet::new("root-1", vec!["CA1-PEM".to_string()]),
        services,
    }
}

fn service(name: &str, instances: Vec<Instance>, sources: &[&str]) -> DownstreamService {
    DownstreamService {
        name: name.to_string(),
        instances,
        intentions: sources.iter().map(|s| s.to_string()).collect(),
        leaf: LeafCertificate {
            cert_pem: format!("{name}-CERT"),
            key_pem: format!("{name}-KEY"),
        },
        proxy_tls: None,
        trust_bundle: vec!["CA1-PEM".to_string()],
    }
}

fn instance(id: &str, address: &str, port: u16) -> Instance {
    Instance {
        id: id.to_string(),
        address: address.to_string(),
        port,
    }
}

fn records(req: &As3Request) -> BTreeMap<String, String> {
    match req.application().get("target-dg") {
        Some(Object::DataGroup(group)) => group
            .records
            .iter()
            .map(|r| (r.key.clone(), r.value.clone()))
            .collect(),
        object => panic!("unexpected data group: {object:?}"),
    }
}

fn agent(url: String) -> Agent {
    Agent::new(agent_config(url)).expect("agent must build")
}

fn agent_config(url: String) -> AgentConfig {
    AgentConfig {
        url,
        username: "admin".to_string(),
        password: "secret".to_string(),
        insecure: false,
        retry: Duration::from_millis(10),
        timeout: Duration::from_secs(5),
    }
}

/// Serves one connection per status, in order, returning the base URL and a
/// handle resolving to the raw requests received.
async fn serve(statuses: Vec<&'static str>) -> (String, tokio::task::JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let task = tokio::spawn(async move {
        let mut requests = Vec::with_capacity(statuses.len());
        for status in statuses {
            let (mut conn, _) = listener.accept().await.expect("accept");
            requests.push(read_request(&mut conn).await);

            let body = if status.starts_with('2') {
                "{}"
            } else {
                "declaration is invalid"
            };
            let rsp = format!(
                "HTTP/1.1 {status}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            conn.write_all(rsp.as_bytes()).await.expect("write");
            conn.shutdown().await.ok();
        }
        requests
    });
    (format!("http://{addr}"), task)
}

async fn read_request(conn: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let len = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .map(|v| v.trim().parse::<usize>().unwrap())
                .unwrap_or(0);
            if buf.len() >= end + 4 + len {
                return String::from_utf8_lossy(&buf).into_owned();
            }
        }
        let n = conn.read(&mut chunk).await.expect("read");
        assert_ne!(n, 0, "client closed before sending a request");
        buf.extend_from_slice(&chunk[..n]);
    }
}
