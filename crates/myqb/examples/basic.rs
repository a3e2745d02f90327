//! Fluent querying against a local MySQL server.
//!
//! ```sh
//! cargo run --example basic
//! ```

use myqb::{Db, DbConfig, Dir, QbResult, Upsert, Value};

#[tokio::main]
async fn main() -> QbResult<()> {
    let mut db = Db::connect(
        DbConfig::new()
            .host("127.0.0.1")
            .port(3306)
            .dbname("test")
            .username("root")
            .charset("utf8mb4"),
    )
    .await?;

    // Inspect the SQL a statement would run without executing it.
    let sql = db
        .table("user")?
        .fields(["user_id", "username"])
        .where_("user_id|>=", 20)?
        .where_("username|~", "dave")?
        .order("user_id", Dir::Desc)
        .page(1, 10)
        .fetch_sql(true)
        .get_list()
        .await?
        .sql()
        .unwrap_or_default();
    println!("would run: {sql}");

    let id = db
        .table("user")?
        .insert_one(
            [
                ("username", Value::from("dave")),
                ("age", Value::from(30)),
            ],
            Upsert::None,
        )
        .await?
        .data()?;
    println!("inserted: {id:?}");

    let users = db
        .table("user")?
        .where_("age|<>", vec![18, 65])?
        .get_list()
        .await?
        .data()?;
    for user in &users {
        println!("{:?}", user.get("username"));
    }

    let total = db.table("user")?.count().await?.data()?;
    println!("{total} users");

    Ok(())
}
