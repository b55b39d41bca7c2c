use rds_data_api::{DataApi, DataApiConfig, HttpTransport, Params};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let transport = HttpTransport::from_env()?;
    let mut api = DataApi::new(transport, DataApiConfig::from_env()?)?;

    let names = ["bird", "lion", "tiger", "whale"];
    let results = api
        .batch_execute(
            "INSERT INTO pets (name) VALUES (:name)",
            names.iter().map(|name| Params::new().bind("name", *name)),
        )
        .await?;

    for (name, generated) in names.iter().zip(&results) {
        println!("{name}: {generated}");
    }

    Ok(())
}
