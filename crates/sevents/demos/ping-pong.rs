//! Two endpoints wired back to back, each sending and receiving events.
//!
//! Run with:
//!   cargo run -p sevents --example ping-pong

#[cfg(unix)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::os::unix::net::UnixStream;
    use std::sync::mpsc;
    use std::time::Duration;

    use serde_json::json;
    use sevents::transport::EventStream;
    use sevents::Payload;

    fn show(body: &Payload) -> String {
        body.as_value()
            .map_or_else(|| "<none>".to_string(), ToString::to_string)
    }

    let (a, b) = UnixStream::pair()?;
    let a = EventStream::from(a);
    let b = EventStream::from(b);

    let mut a_send = sevents::writer(a.try_clone()?)?;
    let a_receive = sevents::reader(a, None)?;
    let mut b_send = sevents::writer(b.try_clone()?)?;
    let b_receive = sevents::reader(b, None)?;

    let (seen_tx, seen_rx) = mpsc::channel();
    let a_events = a_receive.events().clone();
    let catch_all = {
        let seen_tx = seen_tx.clone();
        a_events.listen(move |name, body| {
            println!("a <- {name} {}", show(body));
            let _ = seen_tx.send(name.to_string());
        })
    };
    b_receive
        .events()
        .listen(|name, body| println!("b <- {name} {}", show(body)));

    let _a_thread = a_receive.spawn()?;
    let _b_thread = b_receive.spawn()?;

    a_send.send("a:foo", Some(&json!({"hello": "world"})))?;
    b_send.send_bare("b:foo")?;
    seen_rx.recv_timeout(Duration::from_secs(5))?;

    // Only the exact-name listener should see this one.
    a_events.on("b:ok", move |body| {
        println!("a <- b:ok {} (handled once)", show(body));
        let _ = seen_tx.send("b:ok".to_string());
    })?;
    a_events.off_any(Some(catch_all));
    b_send.send("b:ok", Some(&200))?;
    seen_rx.recv_timeout(Duration::from_secs(5))?;

    Ok(())
}

#[cfg(not(unix))]
fn main() {
    eprintln!("ping-pong needs unix socket pairs");
}
