//! Ingredients, recipes, and the local menu-catalog mirror.

use anyhow::{Context, Result};
use sqlx::sqlite::SqliteConnection;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Ingredients
// ---------------------------------------------------------------------------

/// One stocked ingredient. `id` is a stable slug, unique and immutable once
/// assigned; stock may legitimately go negative.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Ingredient {
    pub id: String,
    pub name: String,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub current_stock: f64,
    pub threshold: f64,
    pub cost_per_unit: f64,
}

fn ingredient_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Ingredient> {
    Ok(Ingredient {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        category: row.try_get("category")?,
        unit: row.try_get("unit")?,
        current_stock: row.try_get("current_stock")?,
        threshold: row.try_get("threshold")?,
        cost_per_unit: row.try_get("cost_per_unit")?,
    })
}

/// All ingredients, sorted by name.
pub async fn list_ingredients(pool: &SqlitePool) -> Result<Vec<Ingredient>> {
    let rows = sqlx::query("select * from ingredients order by name asc")
        .fetch_all(pool)
        .await
        .context("list_ingredients failed")?;
    rows.iter().map(ingredient_from_row).collect()
}

pub async fn get_ingredient(pool: &SqlitePool, id: &str) -> Result<Option<Ingredient>> {
    let row = sqlx::query("select * from ingredients where id = ?1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("get_ingredient failed")?;
    row.as_ref().map(ingredient_from_row).transpose()
}

#[derive(Debug, Clone)]
pub struct NewIngredient {
    pub name: String,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub cost_per_unit: f64,
    pub threshold: f64,
}

/// Derive a slug id from an ingredient name.
fn slugify(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

/// Create an ingredient with zero starting stock.
///
/// The slug id is derived from the name; collisions get a numeric suffix
/// (`flour`, `flour_1`, ...).
pub async fn create_ingredient(pool: &SqlitePool, new: &NewIngredient) -> Result<Ingredient> {
    let base = slugify(&new.name);
    let mut id = base.clone();
    let mut counter = 1u32;
    loop {
        let taken: Option<(String,)> =
            sqlx::query_as("select id from ingredients where id = ?1")
                .bind(&id)
                .fetch_optional(pool)
                .await
                .context("create_ingredient id probe failed")?;
        if taken.is_none() {
            break;
        }
        id = format!("{base}_{counter}");
        counter += 1;
    }

    sqlx::query(
        r#"
        insert into ingredients (id, name, category, unit, cost_per_unit, current_stock, threshold)
        values (?1, ?2, ?3, ?4, ?5, 0.0, ?6)
        "#,
    )
    .bind(&id)
    .bind(&new.name)
    .bind(&new.category)
    .bind(&new.unit)
    .bind(new.cost_per_unit)
    .bind(new.threshold)
    .execute(pool)
    .await
    .context("create_ingredient insert failed")?;

    get_ingredient(pool, &id)
        .await?
        .context("created ingredient not found")
}

/// Partial ingredient update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct IngredientPatch {
    pub name: Option<String>,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub threshold: Option<f64>,
    pub cost_per_unit: Option<f64>,
    pub current_stock: Option<f64>,
}

/// Apply a patch. Returns false when the ingredient does not exist.
pub async fn update_ingredient(
    pool: &SqlitePool,
    id: &str,
    patch: &IngredientPatch,
) -> Result<bool> {
    let res = sqlx::query(
        r#"
        update ingredients set
          name = coalesce(?1, name),
          category = coalesce(?2, category),
          unit = coalesce(?3, unit),
          threshold = coalesce(?4, threshold),
          cost_per_unit = coalesce(?5, cost_per_unit),
          current_stock = coalesce(?6, current_stock)
        where id = ?7
        "#,
    )
    .bind(&patch.name)
    .bind(&patch.category)
    .bind(&patch.unit)
    .bind(patch.threshold)
    .bind(patch.cost_per_unit)
    .bind(patch.current_stock)
    .bind(id)
    .execute(pool)
    .await
    .context("update_ingredient failed")?;

    Ok(res.rows_affected() > 0)
}

/// Delete an ingredient along with its recipe lines.
pub async fn delete_ingredient(pool: &SqlitePool, id: &str) -> Result<bool> {
    let mut tx = pool.begin().await.context("delete_ingredient begin failed")?;

    sqlx::query("delete from recipe_components where ingredient_id = ?1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("delete_ingredient recipe cleanup failed")?;

    let res = sqlx::query("delete from ingredients where id = ?1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("delete_ingredient failed")?;

    tx.commit().await.context("delete_ingredient commit failed")?;
    Ok(res.rows_affected() > 0)
}

// ---------------------------------------------------------------------------
// Recipes
// ---------------------------------------------------------------------------

/// One ingredient requirement for one sold unit of a menu item.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RecipeComponent {
    pub ingredient_id: String,
    pub quantity: f64,
}

/// All recipes, grouped by menu item external id.
pub async fn all_recipes(pool: &SqlitePool) -> Result<HashMap<String, Vec<RecipeComponent>>> {
    let rows = sqlx::query(
        "select menu_item_guid, ingredient_id, quantity from recipe_components",
    )
    .fetch_all(pool)
    .await
    .context("all_recipes failed")?;

    let mut out: HashMap<String, Vec<RecipeComponent>> = HashMap::new();
    for row in rows {
        let guid: String = row.try_get("menu_item_guid")?;
        let ingredient_id: Option<String> = row.try_get("ingredient_id")?;
        let quantity: Option<f64> = row.try_get("quantity")?;
        let (Some(ingredient_id), Some(quantity)) = (ingredient_id, quantity) else {
            continue;
        };
        out.entry(guid).or_default().push(RecipeComponent {
            ingredient_id,
            quantity,
        });
    }
    Ok(out)
}

/// Replace every recipe line for a menu item (delete + insert, one
/// transaction). There is no partial recipe update.
pub async fn replace_recipe(
    pool: &SqlitePool,
    menu_item_guid: &str,
    components: &[RecipeComponent],
) -> Result<()> {
    let mut tx = pool.begin().await.context("replace_recipe begin failed")?;

    sqlx::query("delete from recipe_components where menu_item_guid = ?1")
        .bind(menu_item_guid)
        .execute(&mut *tx)
        .await
        .context("replace_recipe delete failed")?;

    for c in components {
        sqlx::query(
            r#"
            insert into recipe_components (menu_item_guid, ingredient_id, quantity)
            values (?1, ?2, ?3)
            "#,
        )
        .bind(menu_item_guid)
        .bind(&c.ingredient_id)
        .bind(c.quantity)
        .execute(&mut *tx)
        .await
        .context("replace_recipe insert failed")?;
    }

    tx.commit().await.context("replace_recipe commit failed")?;
    Ok(())
}

pub async fn delete_recipe(pool: &SqlitePool, menu_item_guid: &str) -> Result<bool> {
    let res = sqlx::query("delete from recipe_components where menu_item_guid = ?1")
        .bind(menu_item_guid)
        .execute(pool)
        .await
        .context("delete_recipe failed")?;
    Ok(res.rows_affected() > 0)
}

/// Every resolvable recipe line as flat `(menu item, ingredient, qty)`
/// tuples; the sync engine loads these once per batch into its lookup table.
/// Lines whose ingredient no longer exists are dropped here, so they
/// contribute zero deductions instead of failing a commit.
pub async fn all_recipe_lines(pool: &SqlitePool) -> Result<Vec<(String, String, f64)>> {
    let rows = sqlx::query(
        r#"
        select rc.menu_item_guid, rc.ingredient_id, rc.quantity
        from recipe_components rc
        join ingredients i on i.id = rc.ingredient_id
        where rc.quantity is not null
        "#,
    )
    .fetch_all(pool)
    .await
    .context("all_recipe_lines failed")?;

    rows.iter()
        .map(|row| {
            Ok((
                row.try_get("menu_item_guid")?,
                row.try_get("ingredient_id")?,
                row.try_get("quantity")?,
            ))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Menu catalog mirror
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct MenuItem {
    pub item_guid: String,
    pub item_name: String,
    pub menu: Option<String>,
    pub group_path: Option<String>,
}

/// Insert or refresh one catalog entry by upstream guid.
pub async fn upsert_menu_item(conn: &mut SqliteConnection, item: &MenuItem) -> Result<()> {
    sqlx::query(
        r#"
        insert into menu_items (menu, group_path, item_name, item_guid)
        values (?1, ?2, ?3, ?4)
        on conflict(item_guid) do update set
          menu = excluded.menu,
          group_path = excluded.group_path,
          item_name = excluded.item_name
        "#,
    )
    .bind(&item.menu)
    .bind(&item.group_path)
    .bind(&item.item_name)
    .bind(&item.item_guid)
    .execute(conn)
    .await
    .context("upsert_menu_item failed")?;
    Ok(())
}

/// All catalog entries ordered for display.
pub async fn list_menu_items(pool: &SqlitePool) -> Result<Vec<MenuItem>> {
    let rows = sqlx::query(
        r#"
        select item_guid, item_name, menu, group_path
        from menu_items
        order by menu, item_name
        "#,
    )
    .fetch_all(pool)
    .await
    .context("list_menu_items failed")?;

    rows.iter()
        .map(|row| {
            Ok(MenuItem {
                item_guid: row.try_get("item_guid")?,
                item_name: row.try_get("item_name")?,
                menu: row.try_get("menu")?,
                group_path: row.try_get("group_path")?,
            })
        })
        .collect()
}

/// Catalog name for one menu item guid, if mirrored locally.
pub async fn menu_item_name(pool: &SqlitePool, item_guid: &str) -> Result<Option<String>> {
    let row: Option<(String,)> =
        sqlx::query_as("select item_name from menu_items where item_guid = ?1")
            .bind(item_guid)
            .fetch_optional(pool)
            .await
            .context("menu_item_name failed")?;
    Ok(row.map(|(name,)| name))
}
