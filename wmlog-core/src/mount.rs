//! Пользовательские отведения и вычисление отведений по чанку.

use serde_json::Value;
use wmlog_types::{CustomMount, Mappings, MountError, SampleChunk};

use crate::error::WmResult;

/// Разбирает JSON-объект `{"lead": [i] | [i, j], ...}`.
///
/// `null` — пустая схема. Отдельное целое принимается как `[i]`. Порядок
/// отведений совпадает с порядком ключей в документе. Арность и границы
/// индексов проверяются позже, в `Channels::add_custom_mount`.
pub fn parse_custom_mount(value: &Value) -> Result<CustomMount, MountError> {
    let mut custom = CustomMount::new();

    let object = match value {
        Value::Null => return Ok(custom),
        Value::Object(object) => object,
        other => return Err(MountError::NotAMapping(other.to_string())),
    };

    for (lead, sources) in object {
        let indices = match sources {
            Value::Array(items) => items
                .iter()
                .map(|item| as_index(lead, item))
                .collect::<Result<Vec<_>, _>>()?,
            single @ Value::Number(_) => vec![as_index(lead, single)?],
            other => {
                return Err(MountError::NotAnInteger {
                    lead: lead.clone(),
                    found: other.to_string(),
                })
            }
        };

        custom.insert(lead.as_str(), indices);
    }

    Ok(custom)
}

fn as_index(
    lead: &str,
    item: &Value,
) -> Result<usize, MountError> {
    item.as_u64()
        .and_then(|i| usize::try_from(i).ok())
        .ok_or_else(|| MountError::NotAnInteger {
            lead: lead.to_string(),
            found: item.to_string(),
        })
}

/// Вычисляет отведения чанка по таблице `mappings`.
///
/// Одна колонка копируется, пара даёт `col[a] - col[b]`.
pub fn mount_channels(
    chunk: &SampleChunk,
    mappings: &Mappings,
) -> WmResult<SampleChunk> {
    Ok(chunk.mount(mappings)?)
}
