use neo4rs::query;
use serde::Serialize;

use crate::GraphClient;

/// How many rows the ranking queries return.
pub const TOP_LIMIT: i64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserDegree {
    pub id: String,
    pub name: String,
    pub follows: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupDegree {
    pub id: String,
    pub name: String,
    pub members: i64,
}

/// Two users that follow each other. `a.id < b.id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutualPair {
    pub a: UserRef,
    pub b: UserRef,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GraphCounts {
    pub users: i64,
    pub groups: i64,
    pub follows: i64,
    pub subscribes: i64,
}

/// Read-only aggregate queries over the crawled graph.
pub struct GraphReader {
    client: GraphClient,
}

impl GraphReader {
    pub fn new(client: GraphClient) -> Self {
        Self { client }
    }

    /// Users with the most outgoing Follow edges.
    pub async fn top_users(&self) -> Result<Vec<UserDegree>, neo4rs::Error> {
        let q = query(
            "MATCH (u:User)-[:Follow]->()
             RETURN u.id AS id, coalesce(u.name, '') AS name, count(*) AS follows
             ORDER BY follows DESC, id ASC
             LIMIT $limit",
        )
        .param("limit", TOP_LIMIT);

        let mut results = Vec::new();
        let mut stream = self.client.graph.execute(q).await?;
        while let Some(row) = stream.next().await? {
            results.push(UserDegree {
                id: row.get("id").unwrap_or_default(),
                name: row.get("name").unwrap_or_default(),
                follows: row.get("follows").unwrap_or(0),
            });
        }
        Ok(results)
    }

    /// Groups with the most incoming Subscribe edges.
    pub async fn top_groups(&self) -> Result<Vec<GroupDegree>, neo4rs::Error> {
        let q = query(
            "MATCH (g:Group)<-[:Subscribe]-()
             RETURN g.id AS id, coalesce(g.name, '') AS name, count(*) AS members
             ORDER BY members DESC, id ASC
             LIMIT $limit",
        )
        .param("limit", TOP_LIMIT);

        let mut results = Vec::new();
        let mut stream = self.client.graph.execute(q).await?;
        while let Some(row) = stream.next().await? {
            results.push(GroupDegree {
                id: row.get("id").unwrap_or_default(),
                name: row.get("name").unwrap_or_default(),
                members: row.get("members").unwrap_or(0),
            });
        }
        Ok(results)
    }

    /// Pairs of users with Follow edges in both directions, each pair once.
    pub async fn mutual_followers(&self) -> Result<Vec<MutualPair>, neo4rs::Error> {
        let q = query(
            "MATCH (u1:User)-[:Follow]->(u2:User), (u2)-[:Follow]->(u1)
             WHERE u1.id < u2.id
             RETURN u1.id AS a_id, coalesce(u1.name, '') AS a_name,
                    u2.id AS b_id, coalesce(u2.name, '') AS b_name
             ORDER BY a_id, b_id",
        );

        let mut results = Vec::new();
        let mut stream = self.client.graph.execute(q).await?;
        while let Some(row) = stream.next().await? {
            results.push(MutualPair {
                a: UserRef {
                    id: row.get("a_id").unwrap_or_default(),
                    name: row.get("a_name").unwrap_or_default(),
                },
                b: UserRef {
                    id: row.get("b_id").unwrap_or_default(),
                    name: row.get("b_name").unwrap_or_default(),
                },
            });
        }
        Ok(results)
    }

    /// Node and edge totals, for end-of-run logging.
    pub async fn counts(&self) -> Result<GraphCounts, neo4rs::Error> {
        let q = query(
            "OPTIONAL MATCH (u:User) WITH count(u) AS users
             OPTIONAL MATCH (g:Group) WITH users, count(g) AS groups
             OPTIONAL MATCH ()-[f:Follow]->() WITH users, groups, count(f) AS follows
             OPTIONAL MATCH ()-[s:Subscribe]->()
             RETURN users, groups, follows, count(s) AS subscribes",
        );

        let mut stream = self.client.graph.execute(q).await?;
        let Some(row) = stream.next().await? else {
            return Ok(GraphCounts::default());
        };
        Ok(GraphCounts {
            users: row.get("users").unwrap_or(0),
            groups: row.get("groups").unwrap_or(0),
            follows: row.get("follows").unwrap_or(0),
            subscribes: row.get("subscribes").unwrap_or(0),
        })
    }
}
