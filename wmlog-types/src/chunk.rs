use crate::{ColumnSelection, Mappings, MountError};

/// Матрица отсчётов: строки — выборки, колонки — каналы блока данных.
///
/// Значения уже скорректированы и умножены на разрешение усилителя.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SampleChunk {
    columns: usize,
    values: Vec<i64>,
}

impl SampleChunk {
    /// Строит матрицу из плоского массива в порядке row-major.
    ///
    /// Неполная последняя строка отбрасывается.
    pub fn from_flat(
        mut values: Vec<i64>,
        columns: usize,
    ) -> Self {
        if columns == 0 {
            return Self::default();
        }

        let whole = values.len() - values.len() % columns;
        values.truncate(whole);

        Self { columns, values }
    }

    pub fn rows(&self) -> usize {
        if self.columns == 0 {
            0
        } else {
            self.values.len() / self.columns
        }
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Размерность `(rows, columns)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows(), self.columns)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn row(
        &self,
        r: usize,
    ) -> &[i64] {
        &self.values[r * self.columns..(r + 1) * self.columns]
    }

    pub fn rows_iter(&self) -> impl Iterator<Item = &[i64]> {
        self.values.chunks_exact(self.columns.max(1))
    }

    pub fn get(
        &self,
        r: usize,
        c: usize,
    ) -> Option<i64> {
        if c >= self.columns {
            return None;
        }

        self.values.get(r * self.columns + c).copied()
    }

    pub fn as_flat(&self) -> &[i64] {
        &self.values
    }

    /// Дописывает строки другого чанка с тем же числом колонок.
    ///
    /// Пустой приёмник принимает размерность `other`; пустой `other`
    /// ничего не меняет.
    pub fn append(
        &mut self,
        other: SampleChunk,
    ) -> Result<(), MountError> {
        if other.is_empty() {
            return Ok(());
        }

        if self.is_empty() {
            *self = other;
            return Ok(());
        }

        if other.columns != self.columns {
            return Err(MountError::ColumnCountMismatch {
                expected: self.columns,
                found: other.columns,
            });
        }

        self.values.extend(other.values);

        Ok(())
    }

    /// Вычисляет отведения: `Single(c)` копирует колонку, `Pair(a, b)`
    /// даёт `col[a] - col[b]`. Результат имеет `mappings.len()` колонок.
    pub fn mount(
        &self,
        mappings: &Mappings,
    ) -> Result<SampleChunk, MountError> {
        for (_, selection) in mappings.iter() {
            if selection.max_column() >= self.columns {
                return Err(MountError::ColumnOutOfRange {
                    column: selection.max_column(),
                    columns: self.columns,
                });
            }
        }

        let out_cols = mappings.len();
        let mut values = Vec::with_capacity(self.rows() * out_cols);

        for row in self.rows_iter() {
            for (_, selection) in mappings.iter() {
                values.push(match selection {
                    ColumnSelection::Single(c) => row[c],
                    ColumnSelection::Pair(a, b) => row[a] - row[b],
                });
            }
        }

        Ok(SampleChunk::from_flat(values, out_cols))
    }
}
