//! Dispatch events read from a tokio stream.
//!
//! Run with:
//!   cargo run -p sevents --example async-listen --features async

#[cfg(unix)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use serde_json::json;
    use sevents::frame::listen_async;
    use sevents::Events;
    use tokio::io::AsyncWriteExt;
    use tokio::net::UnixStream;

    let (mut client, server) = UnixStream::pair()?;

    let events = Events::new();
    events.on("tick", |body| println!("tick {:?}", body.as_value()))?;
    events.listen(|name, _| println!("saw {name}"));

    let sender = tokio::spawn(async move {
        for i in 0..3 {
            let frame = sevents::encode("tick", Some(&json!(i)))?;
            client.write_all(&frame).await?;
        }
        client.write_all(&sevents::encode("done", None)?).await?;
        Ok::<_, sevents::FrameError>(())
    });

    listen_async(server, events).await?;
    sender.await??;
    Ok(())
}

#[cfg(not(unix))]
fn main() {
    eprintln!("async-listen needs unix socket pairs");
}
