//! 身份解析：判断目标主机上是否已有对象代表给定父对象。
//!
//! 顺序：
//! 1. 按 `template_id` 匹配已继承的子对象（自然键变化时标记改键）
//! 2. 按自然键匹配，标志不同即冲突，已继承自其它父对象即冲突，否则收编
//! 3. 无匹配则新建

use crate::error::InheritError;
use domain::{ConfigObject, NaturalKey, ObjectId};

/// 解析结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Create,
    UpdateInPlace { existing_id: ObjectId, key_changed: bool },
    Adopt(ObjectId),
}

/// 纯函数：不访问存储。
///
/// `inherited` 为该主机上 `template_id == parent.id` 的对象，
/// `same_key` 为该主机上自然键等于 `child_key` 的对象。
pub fn resolve<T: ConfigObject>(
    parent: &T,
    child_key: &NaturalKey,
    host_name: &str,
    inherited: Option<&T>,
    same_key: Option<&T>,
) -> Result<Resolution, InheritError> {
    if let Some(child) = inherited {
        let existing_id = child.id().unwrap_or_default().to_string();
        let key_changed = child.natural_key() != *child_key;
        if key_changed {
            if let Some(other) = same_key.filter(|other| other.id() != child.id()) {
                return Err(InheritError::AlreadyExists {
                    kind: T::KIND,
                    key: other.label(),
                    host: host_name.to_string(),
                });
            }
        }
        return Ok(Resolution::UpdateInPlace {
            existing_id,
            key_changed,
        });
    }

    let Some(existing) = same_key else {
        return Ok(Resolution::Create);
    };
    if existing.flags() != parent.flags() {
        return Err(InheritError::FlagConflict {
            kind: T::KIND,
            key: existing.label(),
            host: host_name.to_string(),
        });
    }
    if existing
        .template_id()
        .is_some_and(|template_id| Some(template_id) != parent.id())
    {
        return Err(InheritError::AlreadyLinked {
            kind: T::KIND,
            key: existing.label(),
            host: host_name.to_string(),
        });
    }
    Ok(Resolution::Adopt(existing.id().unwrap_or_default().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{Item, ItemType, ObjectFlags};

    fn item(id: &str, host: &str, key: &str) -> Item {
        let mut item = Item::new(host, key, key, ItemType::ZabbixAgent);
        item.item_id = Some(id.to_string());
        item
    }

    fn key(value: &str) -> NaturalKey {
        NaturalKey::Item {
            key: value.to_string(),
        }
    }

    #[test]
    fn no_match_creates() {
        let parent = item("p1", "t1", "agent.ping");
        let resolution = resolve(&parent, &key("agent.ping"), "h1", None, None).expect("resolve");
        assert_eq!(resolution, Resolution::Create);
    }

    #[test]
    fn template_match_wins_over_key_match() {
        let parent = item("p1", "t1", "agent.ping");
        let mut child = item("c1", "h1", "agent.ping");
        child.template_id = Some("p1".to_string());
        let resolution =
            resolve(&parent, &key("agent.ping"), "h1", Some(&child), Some(&child)).expect("resolve");
        assert_eq!(
            resolution,
            Resolution::UpdateInPlace {
                existing_id: "c1".to_string(),
                key_changed: false
            }
        );
    }

    #[test]
    fn changed_key_is_flagged() {
        let parent = item("p1", "t1", "agent.ping.v2");
        let mut child = item("c1", "h1", "agent.ping");
        child.template_id = Some("p1".to_string());
        let resolution =
            resolve(&parent, &key("agent.ping.v2"), "h1", Some(&child), None).expect("resolve");
        assert_eq!(
            resolution,
            Resolution::UpdateInPlace {
                existing_id: "c1".to_string(),
                key_changed: true
            }
        );
    }

    #[test]
    fn changed_key_collision_is_rejected() {
        let parent = item("p1", "t1", "agent.ping.v2");
        let mut child = item("c1", "h1", "agent.ping");
        child.template_id = Some("p1".to_string());
        let other = item("c2", "h1", "agent.ping.v2");
        let err = resolve(&parent, &key("agent.ping.v2"), "h1", Some(&child), Some(&other))
            .expect_err("collision");
        assert!(matches!(err, InheritError::AlreadyExists { .. }));
    }

    #[test]
    fn manual_object_is_adopted() {
        let parent = item("p1", "t1", "agent.ping");
        let manual = item("m1", "h1", "agent.ping");
        let resolution =
            resolve(&parent, &key("agent.ping"), "h1", None, Some(&manual)).expect("resolve");
        assert_eq!(resolution, Resolution::Adopt("m1".to_string()));
    }

    #[test]
    fn different_flags_conflict() {
        let parent = item("p1", "t1", "vfs.fs.discovery");
        let mut rule = item("r1", "h1", "vfs.fs.discovery");
        rule.flags = ObjectFlags::DiscoveryRule;
        let err = resolve(&parent, &key("vfs.fs.discovery"), "h1", None, Some(&rule))
            .expect_err("conflict");
        assert!(matches!(err, InheritError::FlagConflict { .. }));
    }

    #[test]
    fn object_from_other_template_is_already_linked() {
        let parent = item("p1", "t1", "agent.ping");
        let mut foreign = item("c9", "h1", "agent.ping");
        foreign.template_id = Some("p9".to_string());
        let err = resolve(&parent, &key("agent.ping"), "h1", None, Some(&foreign))
            .expect_err("linked");
        assert!(matches!(err, InheritError::AlreadyLinked { .. }));
    }
}
