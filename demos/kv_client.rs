//! Demo client: composed calls, by-reference append, and a loop, all
//! against the `kv_server` example.

use wiregraph::builder::CallBuilder;
use wiregraph::client::{Client, ClientConfig};

/// Seeds two values with a fire-and-forget program.
async fn set_values(client: &Client) -> Result<(), Box<dyn std::error::Error>> {
    let mut b = CallBuilder::new();
    b.invoke("kv/set", ("a", "2000"))?;
    b.invoke("kv/set", ("b", "25"))?;

    client.call(&mut b).await?;
    println!("set values: ok");
    Ok(())
}

/// Fetches both values, parses, adds, and stores the sum in one round trip.
async fn add_values(client: &Client) -> Result<(), Box<dyn std::error::Error>> {
    let mut b = CallBuilder::new();
    let a = b.invoke("kv/get", ("a",))?;
    let a = b.invoke("math/to_int", (a,))?;
    let c = b.invoke("kv/get", ("b",))?;
    let c = b.invoke("math/to_int", (c,))?;
    let sum = b.invoke("math/add", (a, c))?;
    let sum = b.bind(sum);

    let stored = b.invoke("math/to_string", (&sum,))?;
    b.invoke("kv/set", ("sum", stored))?;
    b.mark_outputs(&[&sum]);

    client.call(&mut b).await?;
    let sum: i64 = b.read_output(&sum)?;
    println!("add values: sum is {sum}");
    Ok(())
}

/// Appends the stored sum to a seeded string through a mutable reference;
/// the mutation is observed by reading the literal's own slot back.
async fn append(client: &Client) -> Result<(), Box<dyn std::error::Error>> {
    let mut b = CallBuilder::new();
    let base = b.literal("the sum is ".to_string())?;
    let sum = b.invoke("kv/get", ("sum",))?;
    b.invoke("str/append", (&base, sum))?;
    b.mark_outputs(&[&base]);

    client.call(&mut b).await?;
    let appended: String = b.read_output(&base)?;
    println!("append: {appended:?}");
    Ok(())
}

/// A nullary invocation whose result is the only output.
async fn next_id(client: &Client) -> Result<(), Box<dyn std::error::Error>> {
    let mut b = CallBuilder::new();
    let id = b.invoke("util/next_id", ())?;
    let id = b.bind(id);
    b.mark_outputs(&[&id]);

    client.call(&mut b).await?;
    let id: u64 = b.read_output(&id)?;
    println!("next id is {id}");
    Ok(())
}

/// Counts up by 2 until reaching the limit, entirely server-side.
async fn count_up(client: &Client) -> Result<(), Box<dyn std::error::Error>> {
    let mut b = CallBuilder::new();
    let acc = b.literal(0i64)?;
    let limit = b.literal(11i64)?;
    let pending = b.invoke("math/lt", (&acc, &limit))?;
    let keep_going = b.bind(pending);

    b.while_loop(&keep_going, |b| {
        let next = b.invoke("math/add", (&acc, 2i64))?;
        b.rebind(&acc, next);
        let again = b.invoke("math/lt", (&acc, &limit))?;
        b.rebind(&keep_going, again);
        Ok(())
    })?;
    b.mark_outputs(&[&acc]);

    client.call(&mut b).await?;
    let acc: i64 = b.read_output(&acc)?;
    println!("count up: reached {acc}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    wiregraph::telemetry::init();

    let client = Client::new(ClientConfig::from_env());

    set_values(&client).await?;
    add_values(&client).await?;
    append(&client).await?;
    for _ in 0..3 {
        next_id(&client).await?;
    }
    count_up(&client).await?;

    Ok(())
}
