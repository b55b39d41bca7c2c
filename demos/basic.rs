use rds_data_api::{DataApi, DataApiConfig, HttpTransport, Params, Value};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let transport = HttpTransport::from_env()?;
    let mut api = DataApi::new(transport, DataApiConfig::from_env()?)?;

    api.execute(
        "CREATE TABLE IF NOT EXISTS pets (id SERIAL PRIMARY KEY, name TEXT NOT NULL)",
        (),
    )
    .await?;

    let inserted = api
        .execute(
            "INSERT INTO pets (name) VALUES (:name)",
            Params::new().bind("name", "dog"),
        )
        .await?;
    println!("inserted id: {:?}", inserted.generated_fields_first());

    let result = api
        .execute(
            "SELECT id, name FROM pets WHERE name = :name",
            [("name", Value::from("dog"))],
        )
        .await?;
    for record in result.iter() {
        println!("{record}");
    }

    let count = api
        .transaction(|api| {
            Box::pin(async move {
                api.execute("UPDATE pets SET name = 'cat' WHERE name = 'dog'", ())
                    .await?;
                api.execute("SELECT count(*) FROM pets", ()).await?.scalar()
            })
        })
        .await?;
    println!("pets: {count}");

    Ok(())
}
