use crate::{
    guid::parse_guid,
    role::{Admission, RoleAssignment, RoleRule, ROLE_TABLE},
    types::{BlockDevice, DevNum, PartitionTable},
};

/// Pick the partition to use for each role among the partitions of the root
/// disk. The first partition of a type wins, where first means the lowest
/// partition number, not the enumeration order.
///
/// Roles are returned in the order of [`ROLE_TABLE`].
pub fn classify(
    root: DevNum,
    disk: &BlockDevice,
    siblings: &[BlockDevice],
    table: &PartitionTable,
) -> Vec<(&'static RoleRule, RoleAssignment)> {
    let mut candidates: Vec<Vec<RoleAssignment>> = ROLE_TABLE.iter().map(|_| vec![]).collect();

    for sibling in siblings {
        if sibling.devnum == root || sibling.devnum == disk.devnum {
            continue;
        }
        let node = sibling.node.to_string_lossy();

        let Some(number) = sibling.partition else {
            continue;
        };
        let Some(entry) = table.entry(number) else {
            tracing::debug!("{node}: no entry for partition {number} in the partition table");
            continue;
        };
        let Some(type_guid) = parse_guid(&entry.type_guid) else {
            tracing::debug!("{node}: bad partition type {:?}, ignoring", entry.type_guid);
            continue;
        };
        let Some(index) = ROLE_TABLE
            .iter()
            .position(|rule| rule.type_guid == type_guid)
        else {
            continue;
        };

        let rule = &ROLE_TABLE[index];
        match (rule.admit)(entry.flags) {
            Admission::Admitted { rw } => candidates[index].push(RoleAssignment {
                role: rule.role,
                node: node.into_owned(),
                number,
                rw,
            }),
            Admission::Rejected(reason) => {
                tracing::debug!("{node}: {reason}, not using it for {}", rule.role)
            }
        }
    }

    ROLE_TABLE
        .iter()
        .zip(candidates)
        .filter_map(|(rule, mut candidates)| {
            candidates.sort_by_key(|candidate| candidate.number);
            if let Some(pair) = candidates
                .windows(2)
                .find(|pair| pair[0].number == pair[1].number)
            {
                tracing::warn!(
                    "{} and {} both claim to be partition {}, not using either for {}",
                    pair[0].node,
                    pair[1].node,
                    pair[0].number,
                    rule.role
                );
                return None;
            }

            let winner = candidates.into_iter().next()?;
            tracing::debug!(
                "Using partition {} ({}) for {}",
                winner.number,
                winner.node,
                rule.role
            );
            Some((rule, winner))
        })
        .collect()
}
