//! Commands that change the queue: resubmit, remove and clear.

use super::open_queue;
use serde_json::Value;
use std::path::Path;
use syncq_core::{OperationId, OperationQueue};

/// Replaces an operation with a fresh pending successor.
///
/// This is how a parked conflict is settled by hand: pass the payload to
/// send instead of the original.
pub fn resubmit(path: &Path, id: &OperationId, payload: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let queue = open_queue(path)?;
    let successor = resubmit_in(&queue, id, payload)?;
    println!("Resubmitted {} as {}", id, successor);
    Ok(())
}

fn resubmit_in(
    queue: &OperationQueue<Value>,
    id: &OperationId,
    payload: Option<&str>,
) -> Result<OperationId, Box<dyn std::error::Error>> {
    let payload = payload
        .map(serde_json::from_str::<Value>)
        .transpose()
        .map_err(|e| format!("Invalid --payload JSON: {}", e))?;
    Ok(queue.resubmit(id, payload)?)
}

/// Removes one operation.
pub fn remove(path: &Path, id: &OperationId) -> Result<(), Box<dyn std::error::Error>> {
    let queue = open_queue(path)?;
    queue.remove(id)?;
    println!("Removed {}", id);
    Ok(())
}

/// Removes every operation.
pub fn clear(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let queue = open_queue(path)?;
    let count = queue.len();
    queue.clear()?;
    println!("Removed {} operations", count);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use syncq_core::{Method, NewOperation, OperationStatus};

    #[test]
    fn resubmit_parked_conflict_with_chosen_payload() {
        let queue = OperationQueue::<Value>::open_in_memory().unwrap();
        let id = queue
            .add(NewOperation::new("doc", Method::Put, "/docs/1", json!({"v": 1})))
            .unwrap();
        queue.set_conflict(&id, json!({"v": 2})).unwrap();

        let successor = resubmit_in(&queue, &id, Some(r#"{"v": 3}"#)).unwrap();
        let op = queue.get(&successor).unwrap();
        assert_eq!(op.status, OperationStatus::Pending);
        assert_eq!(op.payload, json!({"v": 3}));
        assert!(queue.get(&id).is_err());
    }

    #[test]
    fn bad_payload_is_rejected_before_touching_queue() {
        let queue = OperationQueue::<Value>::open_in_memory().unwrap();
        let id = queue
            .add(NewOperation::new("doc", Method::Put, "/docs/1", json!({})))
            .unwrap();

        let err = resubmit_in(&queue, &id, Some("{not json")).unwrap_err();
        assert!(err.to_string().contains("Invalid --payload JSON"));
        assert!(queue.get(&id).is_ok());
    }

    #[test]
    fn remove_and_clear_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let queue = OperationQueue::<Value>::open(dir.path()).unwrap();
            queue
                .add(NewOperation::new("doc", Method::Post, "/docs", json!(1)))
                .unwrap();
            queue
                .add(NewOperation::new("doc", Method::Post, "/docs", json!(2)))
                .unwrap()
        };

        remove(dir.path(), &id).unwrap();
        assert_eq!(open_queue(dir.path()).unwrap().len(), 1);
        assert!(remove(dir.path(), &id).is_err());

        clear(dir.path()).unwrap();
        assert!(open_queue(dir.path()).unwrap().is_empty());
    }
}
