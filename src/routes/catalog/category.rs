use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ServiceCategory {
    pub id: Uuid,
    pub service_category_type: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub sort_order: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ServiceSubcategory {
    pub id: Uuid,
    pub category_id: Uuid,
    pub service_subcategory_type: String,
    pub description: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTree {
    #[serde(flatten)]
    pub category: ServiceCategory,
    pub subcategories: Vec<ServiceSubcategory>,
}

/// 按分类归组子分类，保持分类原有顺序；孤立的子分类被丢弃
pub fn group_catalog(
    categories: Vec<ServiceCategory>,
    subcategories: Vec<ServiceSubcategory>,
) -> Vec<CategoryTree> {
    let mut by_parent: HashMap<Uuid, Vec<ServiceSubcategory>> = HashMap::new();
    for sub in subcategories {
        by_parent.entry(sub.category_id).or_default().push(sub);
    }
    categories
        .into_iter()
        .map(|category| CategoryTree {
            subcategories: by_parent.remove(&category.id).unwrap_or_default(),
            category,
        })
        .collect()
}

#[derive(Debug, Deserialize)]
pub struct SetCategoriesRequest {
    #[serde(default)]
    pub category_ids: Vec<Uuid>,
    #[serde(default)]
    pub subcategory_ids: Vec<Uuid>,
}

/// 待写入的关联：分类集合与 (分类, 子分类) 对
#[derive(Debug, PartialEq)]
pub struct CategoryAssignment {
    pub category_ids: Vec<Uuid>,
    pub subcategory_pairs: Vec<(Uuid, Uuid)>,
}

/// `parents` 为子分类到所属分类的映射（来自数据库）
pub fn plan_assignment(
    req: &SetCategoriesRequest,
    parents: &HashMap<Uuid, Uuid>,
) -> Result<CategoryAssignment, AppError> {
    let categories: BTreeSet<Uuid> = req.category_ids.iter().copied().collect();
    let subcategories: BTreeSet<Uuid> = req.subcategory_ids.iter().copied().collect();

    let mut pairs = Vec::with_capacity(subcategories.len());
    for sub in subcategories {
        let parent = parents
            .get(&sub)
            .ok_or_else(|| AppError::Validation(format!("unknown subcategory {}", sub)))?;
        if !categories.contains(parent) {
            return Err(AppError::Validation(format!(
                "subcategory {} belongs to category {} which is not selected",
                sub, parent
            )));
        }
        pairs.push((*parent, sub));
    }

    Ok(CategoryAssignment {
        category_ids: categories.into_iter().collect(),
        subcategory_pairs: pairs,
    })
}

const CATEGORY_COLUMNS: &str =
    "c.id, c.service_category_type::text AS service_category_type, c.description, c.is_active, c.sort_order";
const SUBCATEGORY_COLUMNS: &str =
    "s.id, s.category_id, s.service_subcategory_type::text AS service_subcategory_type, s.description, s.is_active";

pub async fn load_catalog(pool: &PgPool) -> Result<Vec<CategoryTree>, sqlx::Error> {
    let categories = sqlx::query_as::<_, ServiceCategory>(&format!(
        "SELECT {} FROM service_categories c WHERE c.is_active \
         ORDER BY c.sort_order NULLS LAST, c.service_category_type",
        CATEGORY_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    let subcategories = sqlx::query_as::<_, ServiceSubcategory>(&format!(
        "SELECT {} FROM service_subcategories s WHERE s.is_active \
         ORDER BY s.service_subcategory_type",
        SUBCATEGORY_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    Ok(group_catalog(categories, subcategories))
}

pub async fn load_business_categories(
    pool: &PgPool,
    business_id: Uuid,
) -> Result<Vec<CategoryTree>, sqlx::Error> {
    let categories = sqlx::query_as::<_, ServiceCategory>(&format!(
        "SELECT {} FROM business_service_categories bc \
         JOIN service_categories c ON c.id = bc.category_id \
         WHERE bc.business_id = $1 AND bc.is_active \
         ORDER BY c.sort_order NULLS LAST, c.service_category_type",
        CATEGORY_COLUMNS
    ))
    .bind(business_id)
    .fetch_all(pool)
    .await?;

    let subcategories = sqlx::query_as::<_, ServiceSubcategory>(&format!(
        "SELECT {} FROM business_service_subcategories bs \
         JOIN service_subcategories s ON s.id = bs.subcategory_id \
         WHERE bs.business_id = $1 AND bs.is_active \
         ORDER BY s.service_subcategory_type",
        SUBCATEGORY_COLUMNS
    ))
    .bind(business_id)
    .fetch_all(pool)
    .await?;

    Ok(group_catalog(categories, subcategories))
}

pub async fn subcategory_parents(
    pool: &PgPool,
    subcategory_ids: &[Uuid],
) -> Result<HashMap<Uuid, Uuid>, sqlx::Error> {
    if subcategory_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = sqlx::query_as::<_, (Uuid, Uuid)>(
        "SELECT id, category_id FROM service_subcategories WHERE id = ANY($1)",
    )
    .bind(subcategory_ids)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().collect())
}

pub async fn missing_categories(
    pool: &PgPool,
    category_ids: &[Uuid],
) -> Result<Vec<Uuid>, sqlx::Error> {
    if category_ids.is_empty() {
        return Ok(Vec::new());
    }
    let found: BTreeSet<Uuid> = sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM service_categories WHERE id = ANY($1)",
    )
    .bind(category_ids)
    .fetch_all(pool)
    .await?
    .into_iter()
    .collect();
    Ok(category_ids
        .iter()
        .filter(|id| !found.contains(id))
        .copied()
        .collect())
}

/// 先删后插，整体在一个事务中完成
pub async fn replace_business_categories(
    pool: &PgPool,
    business_id: Uuid,
    assignment: &CategoryAssignment,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM business_service_subcategories WHERE business_id = $1")
        .bind(business_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM business_service_categories WHERE business_id = $1")
        .bind(business_id)
        .execute(&mut *tx)
        .await?;

    if !assignment.category_ids.is_empty() {
        sqlx::query(
            r#"
            INSERT INTO business_service_categories (id, business_id, category_id, is_active)
            SELECT gen_random_uuid(), $1, c, TRUE FROM UNNEST($2::uuid[]) AS c
            "#,
        )
        .bind(business_id)
        .bind(&assignment.category_ids)
        .execute(&mut *tx)
        .await?;
    }

    if !assignment.subcategory_pairs.is_empty() {
        let (parents, subs): (Vec<Uuid>, Vec<Uuid>) =
            assignment.subcategory_pairs.iter().copied().unzip();
        sqlx::query(
            r#"
            INSERT INTO business_service_subcategories (id, business_id, category_id, subcategory_id, is_active)
            SELECT gen_random_uuid(), $1, p.category_id, p.subcategory_id, TRUE
            FROM UNNEST($2::uuid[], $3::uuid[]) AS p(category_id, subcategory_id)
            "#,
        )
        .bind(business_id)
        .bind(&parents)
        .bind(&subs)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(id: Uuid, name: &str) -> ServiceCategory {
        ServiceCategory {
            id,
            service_category_type: name.into(),
            description: None,
            is_active: true,
            sort_order: None,
        }
    }

    fn sub(id: Uuid, parent: Uuid, name: &str) -> ServiceSubcategory {
        ServiceSubcategory {
            id,
            category_id: parent,
            service_subcategory_type: name.into(),
            description: None,
            is_active: true,
        }
    }

    #[test]
    fn catalog_groups_subcategories_under_parents() {
        let (beauty, fitness) = (Uuid::new_v4(), Uuid::new_v4());
        let (nails, yoga, orphan) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let tree = group_catalog(
            vec![category(beauty, "beauty"), category(fitness, "fitness")],
            vec![
                sub(nails, beauty, "nail_tech"),
                sub(yoga, fitness, "yoga"),
                sub(orphan, Uuid::new_v4(), "lost"),
            ],
        );
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].category.id, beauty);
        assert_eq!(tree[0].subcategories.len(), 1);
        assert_eq!(tree[0].subcategories[0].id, nails);
        assert_eq!(tree[1].subcategories[0].id, yoga);
    }

    #[test]
    fn catalog_tree_serializes_flat() {
        let id = Uuid::new_v4();
        let tree = group_catalog(vec![category(id, "beauty")], vec![]);
        let json = serde_json::to_value(&tree[0]).unwrap();
        assert_eq!(json["service_category_type"], "beauty");
        assert_eq!(json["subcategories"], serde_json::json!([]));
    }

    #[test]
    fn assignment_requires_parent_category() {
        let (beauty, fitness, nails) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let parents = HashMap::from([(nails, beauty)]);

        let req = SetCategoriesRequest {
            category_ids: vec![fitness],
            subcategory_ids: vec![nails],
        };
        assert!(plan_assignment(&req, &parents).is_err());

        let req = SetCategoriesRequest {
            category_ids: vec![beauty, beauty, fitness],
            subcategory_ids: vec![nails, nails],
        };
        let plan = plan_assignment(&req, &parents).unwrap();
        assert_eq!(plan.category_ids.len(), 2);
        assert_eq!(plan.subcategory_pairs, vec![(beauty, nails)]);
    }

    #[test]
    fn unknown_subcategory_is_rejected() {
        let req = SetCategoriesRequest {
            category_ids: vec![Uuid::new_v4()],
            subcategory_ids: vec![Uuid::new_v4()],
        };
        let err = plan_assignment(&req, &HashMap::new()).unwrap_err();
        assert!(err.to_string().starts_with("unknown subcategory"));
    }

    #[test]
    fn empty_assignment_clears_everything() {
        let req = SetCategoriesRequest {
            category_ids: vec![],
            subcategory_ids: vec![],
        };
        let plan = plan_assignment(&req, &HashMap::new()).unwrap();
        assert!(plan.category_ids.is_empty());
        assert!(plan.subcategory_pairs.is_empty());
    }
}
