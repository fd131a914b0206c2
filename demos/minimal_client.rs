//! Connects to a station, sends a single-point indication, and prints
//! whatever comes back within five seconds.

use std::time::Duration;

use bytes::Bytes;
use voltage_iec104::{
    Asdu, AsduHeader, ClientConfig, Cot, Iec104Client, InformationObject, Ioa, QualityDescriptor,
    SinglePoint, TypeId,
};

#[tokio::main]
async fn main() -> voltage_iec104::Result<()> {
    let config = ClientConfig::new("127.0.0.1:2404");
    let mut client = Iec104Client::new(config);
    client.connect().await?;

    let mut asdu = Asdu::new(AsduHeader::new(TypeId::SinglePoint, 1, Cot::Activation, 1));
    let point = SinglePoint {
        value: true,
        quality: QualityDescriptor::new(),
    };
    asdu.objects.push(InformationObject::new(
        Ioa::new(1),
        Bytes::copy_from_slice(&[point.as_u8()]),
    ));
    client.send_asdu(asdu).await?;

    match tokio::time::timeout(Duration::from_secs(5), client.recv()).await {
        Ok(Ok(response)) => println!("received: {:?}", response),
        Ok(Err(err)) => println!("session error: {err}"),
        Err(_) => println!("no response within 5s"),
    }

    client.close().await?;
    Ok(())
}
