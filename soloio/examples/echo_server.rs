//! Line-echo server: one spawned task per connection.
//!
//! Run with: cargo run --example echo_server
//! Then: printf 'hello\n' | nc 127.0.0.1 <port>

use std::net::Ipv4Addr;

use soloio::{BufReader, BufWriter, Runtime, TcpListener};

fn main() -> Result<(), soloio::Error> {
    let rt = Runtime::new()?;
    let reactor = rt.reactor();
    let spawner = rt.spawner();

    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, 0).into())?;
    println!("echo server on port {}", listener.local_addr().port());

    let err = rt.block_on(async move {
        loop {
            match listener.accept(&reactor).await {
                Ok((stream, peer)) => {
                    println!("accepted {peer}");
                    let reactor = reactor.clone();
                    spawner.spawn(async move {
                        let mut reader = BufReader::new(&reactor, stream.fd());
                        let mut writer = BufWriter::new(&reactor, stream.fd());
                        loop {
                            let Ok(line) = reader.get_line(b"\n").await else {
                                break;
                            };
                            if line.value.is_empty() && line.hup {
                                break;
                            }
                            let echoed = async {
                                writer.write(&line.value).await?;
                                writer.write(b"\n").await?;
                                writer.flush().await
                            };
                            if echoed.await.is_err() {
                                break;
                            }
                            if line.hup {
                                break;
                            }
                        }
                    });
                }
                Err(err) => return err,
            }
        }
    })?;
    Err(err)
}
