//! Shared helpers for the Parlor benchmarks.

use parlor_core::{Client, Membership, Profile, RoomHandle};
use tokio::task::JoinHandle;

/// Join `count` members that discard everything they receive.
///
/// Returns the memberships and drain tasks; dropping the memberships
/// removes the members.
pub async fn join_sinks(
    room: &RoomHandle,
    count: usize,
    capacity: usize,
) -> (Vec<Membership>, Vec<JoinHandle<()>>) {
    let mut memberships = Vec::with_capacity(count);
    let mut drains = Vec::with_capacity(count);

    for i in 0..count {
        let mut client = Client::new(Profile::new().with("name", format!("sink-{i}")), capacity);
        match room.join(&mut client).await {
            Ok(membership) => memberships.push(membership),
            Err(_) => break,
        }
        let (_, _, mut outbound) = client.into_parts();
        drains.push(tokio::spawn(async move {
            while outbound.recv().await.is_some() {}
        }));
    }

    (memberships, drains)
}
