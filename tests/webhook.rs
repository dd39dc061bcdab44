// Copyright 2024 FastLabs Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![cfg(feature = "webhook")]

use std::io::BufRead;
use std::io::BufReader;
use std::io::Read;
use std::io::Write;
use std::net::TcpListener;
use std::thread::JoinHandle;
use std::time::Duration;

use hourlog::ErrorKind;
use hourlog::HourlyFileBuilder;
use hourlog::Writer;
use hourlog::alert::AlertForwarderBuilder;
use hourlog::alert::AlertMessage;
use hourlog::alert::Notify;
use hourlog::alert::Webhook;
use log::Level;
use tempfile::TempDir;

#[derive(Debug)]
struct Captured {
    request_line: String,
    content_type: Option<String>,
    body: Vec<u8>,
}

/// Accept `n` requests, answering each with `status`.
fn serve(n: usize, status: u16) -> (String, JoinHandle<Vec<Captured>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/hooks/alerts", listener.local_addr().unwrap());

    let handle = std::thread::spawn(move || {
        let mut captured = vec![];
        for _ in 0..n {
            let (stream, _) = listener.accept().unwrap();
            stream
                .set_read_timeout(Some(Duration::from_secs(5)))
                .unwrap();
            let mut reader = BufReader::new(stream);

            let mut request_line = String::new();
            reader.read_line(&mut request_line).unwrap();

            let mut content_type = None;
            let mut content_length = 0;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                let line = line.trim_end();
                if line.is_empty() {
                    break;
                }
                let (name, value) = line.split_once(':').unwrap();
                let value = value.trim();
                if name.eq_ignore_ascii_case("content-type") {
                    content_type = Some(value.to_string());
                } else if name.eq_ignore_ascii_case("content-length") {
                    content_length = value.parse().unwrap();
                }
            }

            let mut body = vec![0; content_length];
            reader.read_exact(&mut body).unwrap();

            let mut stream = reader.into_inner();
            write!(
                stream,
                "HTTP/1.1 {status} Status\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
            )
            .unwrap();
            stream.flush().unwrap();

            captured.push(Captured {
                request_line: request_line.trim_end().to_string(),
                content_type,
                body,
            });
        }
        captured
    });

    (url, handle)
}

#[test]
fn test_webhook_posts_json() {
    let (url, server) = serve(1, 200);
    let webhook = Webhook::new(url).unwrap();

    let alert = AlertMessage {
        text: "disk full".to_string(),
        username: "logbot".to_string(),
        channel: "#ops".to_string(),
    };
    webhook.notify(&alert).unwrap();

    let captured = server.join().unwrap();
    assert_eq!(captured[0].request_line, "POST /hooks/alerts HTTP/1.1");
    assert_eq!(captured[0].content_type.as_deref(), Some("application/json"));
    let body: AlertMessage = serde_json::from_slice(&captured[0].body).unwrap();
    assert_eq!(body, alert);
}

#[test]
fn test_webhook_rejects_non_success_status() {
    let (url, server) = serve(1, 500);
    let webhook = Webhook::new(url).unwrap();

    let err = webhook
        .notify(&AlertMessage {
            text: "boom".to_string(),
            username: "logbot".to_string(),
            channel: "#ops".to_string(),
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Alert);
    assert!(err.to_string().contains("500"));

    server.join().unwrap();
}

#[test]
fn test_unreachable_webhook_does_not_fail_writes() {
    // bind and drop to get a port nobody listens on
    let port = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let webhook = Webhook::with_timeout(
        format!("http://127.0.0.1:{port}/hooks/alerts"),
        Duration::from_millis(200),
    )
    .unwrap();
    let alerts = AlertForwarderBuilder::new(webhook, "logbot", "#ops")
        .trap(hourlog::DefaultTrap::default())
        .build()
        .unwrap();

    let temp_dir = TempDir::new().expect("failed to create a temporary directory");
    let sink = HourlyFileBuilder::new(temp_dir.path())
        .alerts(alerts)
        .build()
        .unwrap();

    sink.write("error while nobody listens\n", Level::Error)
        .unwrap();
    let file = sink.current_file().unwrap();
    sink.close().unwrap();

    let content = std::fs::read_to_string(file).unwrap();
    assert_eq!(content, "error while nobody listens\n");
}

#[test]
fn test_sink_alerts_reach_webhook() {
    let (url, server) = serve(1, 200);
    let alerts = AlertForwarderBuilder::new(Webhook::new(url).unwrap(), "logbot", "#alerts")
        .shutdown_timeout(Duration::from_secs(5))
        .build()
        .unwrap();

    let temp_dir = TempDir::new().expect("failed to create a temporary directory");
    let sink = HourlyFileBuilder::new(temp_dir.path())
        .alerts(alerts)
        .build()
        .unwrap();

    sink.write("just info\n", Level::Info).unwrap();
    sink.write("database unreachable\n", Level::Error).unwrap();
    sink.close().unwrap();

    let captured = server.join().unwrap();
    let body: AlertMessage = serde_json::from_slice(&captured[0].body).unwrap();
    assert_eq!(
        body,
        AlertMessage {
            text: "database unreachable\n".to_string(),
            username: "logbot".to_string(),
            channel: "#alerts".to_string(),
        }
    );
}
