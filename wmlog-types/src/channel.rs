use crate::MountError;

/// Источник сигнала канала (код из подблока канала)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputSource {
    /// Давление (коды 0 и 3)
    Pres,
    /// Поверхностное ЭКГ
    Ecg,
    /// Коммутационная коробка (junction box)
    Jbox,
    /// Внешний вход
    Ext,
    /// Канал синхронизации
    Sync,
    /// Код вне таблицы
    Unknown(u8),
}

/// Один адресуемый униполярный канал.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    /// Имя после очистки от символов, недопустимых в путях
    pub name: String,
    /// Позиция колонки в строке блока данных
    pub reference: usize,
    /// Источник сигнала
    pub source: InputSource,
    /// Пин коммутационной коробки (None если 0xFF)
    pub pin: Option<u8>,
}

/// Отведение: один канал или пара каналов таблицы.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mount {
    /// Индекс в `Channels::content`
    Unipolar(usize),
    /// Индексы положительного и отрицательного каналов
    Bipolar(usize, usize),
}

/// Выбор колонок чанка для одного выходного отведения.
///
/// `Pair(a, b)` означает значение `col[a] - col[b]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnSelection {
    Single(usize),
    Pair(usize, usize),
}

/// Упорядоченное отображение имя отведения → колонки.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mappings(Vec<(String, ColumnSelection)>);

/// Пользовательская схема отведений до проверки.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomMount(Vec<(String, Vec<usize>)>);

/// Таблица каналов и отведений лога.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Channels {
    content: Vec<Channel>,
    mount: Vec<(String, Mount)>,
}

impl InputSource {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 | 3 => InputSource::Pres,
            1 => InputSource::Ecg,
            2 => InputSource::Jbox,
            4 => InputSource::Ext,
            5 => InputSource::Sync,
            other => InputSource::Unknown(other),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InputSource::Pres => "PRES",
            InputSource::Ecg => "ECG",
            InputSource::Jbox => "JBOX",
            InputSource::Ext => "EXT",
            InputSource::Sync => "SYNC",
            InputSource::Unknown(_) => "UNKNOWN",
        }
    }
}

impl Mount {
    /// Индексы в порядке хранения.
    pub fn indices(&self) -> Vec<usize> {
        match *self {
            Mount::Unipolar(i) => vec![i],
            Mount::Bipolar(pos, neg) => vec![pos, neg],
        }
    }
}

impl ColumnSelection {
    /// Наибольший номер колонки, на который ссылается выбор.
    pub fn max_column(&self) -> usize {
        match *self {
            ColumnSelection::Single(c) => c,
            ColumnSelection::Pair(a, b) => a.max(b),
        }
    }
}

impl Mappings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Вставляет или заменяет значение, сохраняя позицию существующего ключа.
    pub fn insert(
        &mut self,
        name: String,
        selection: ColumnSelection,
    ) {
        upsert(&mut self.0, name, selection);
    }

    pub fn get(
        &self,
        name: &str,
    ) -> Option<ColumnSelection> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| *v)
    }

    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|(k, _)| k.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ColumnSelection)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Оставляет только отведения, для которых `keep` вернул `true`.
    pub fn retain<F: FnMut(&str) -> bool>(
        &mut self,
        mut keep: F,
    ) {
        self.0.retain(|(k, _)| keep(k));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl CustomMount {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        lead: impl Into<String>,
        indices: Vec<usize>,
    ) {
        upsert(&mut self.0, lead.into(), indices);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[usize])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Channels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Добавляет униполярное отведение с одним каналом.
    pub fn add_unipolar(
        &mut self,
        lead: String,
        channel: Channel,
    ) {
        let idx = self.content.len();

        self.content.push(channel);
        upsert(&mut self.mount, lead, Mount::Unipolar(idx));
    }

    /// Добавляет биполярное отведение как два независимых канала `(i, i+1)`.
    pub fn add_bipolar(
        &mut self,
        lead: String,
        positive: Channel,
        negative: Channel,
    ) {
        let idx = self.content.len();

        self.content.push(positive);
        self.content.push(negative);
        upsert(&mut self.mount, lead, Mount::Bipolar(idx, idx + 1));
    }

    pub fn content(&self) -> &[Channel] {
        &self.content
    }

    pub fn mount(&self) -> impl Iterator<Item = (&str, Mount)> {
        self.mount.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn get_mount(
        &self,
        lead: &str,
    ) -> Option<Mount> {
        self.mount.iter().find(|(k, _)| k == lead).map(|(_, v)| *v)
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Каждый канал как отдельная колонка, без вычисления отведений.
    pub fn raw_mappings(&self) -> Mappings {
        let mut mappings = Mappings::new();

        for ch in &self.content {
            mappings.insert(ch.name.clone(), ColumnSelection::Single(ch.reference));
        }

        mappings
    }

    /// Отведения схемы монтажа.
    ///
    /// Для биполярного отведения `(i, j)` возвращается
    /// `Pair(ref(j), ref(i))`: прибор хранит полярность наоборот,
    /// и значение отведения равно `col[ref(j)] - col[ref(i)]`.
    pub fn computed_mappings(&self) -> Mappings {
        let mut mappings = Mappings::new();

        for (lead, mount) in &self.mount {
            let selection = match *mount {
                Mount::Unipolar(i) => ColumnSelection::Single(self.content[i].reference),
                Mount::Bipolar(i, j) => {
                    ColumnSelection::Pair(self.content[j].reference, self.content[i].reference)
                }
            };

            mappings.insert(lead.clone(), selection);
        }

        mappings
    }

    /// Проверяет и добавляет пользовательские отведения.
    ///
    /// При `override_mount` таблица заменяется целиком, иначе
    /// объединяется по ключам (новые значения побеждают). При ошибке
    /// таблица не изменяется.
    pub fn add_custom_mount(
        &mut self,
        custom: &CustomMount,
        override_mount: bool,
    ) -> Result<(), MountError> {
        if custom.is_empty() {
            return Ok(());
        }

        let mut validated = Vec::with_capacity(custom.len());

        for (lead, indices) in custom.iter() {
            validated.push((lead.to_string(), self.validate_mount(lead, indices)?));
        }

        if override_mount {
            self.mount = validated;
        } else {
            for (lead, mount) in validated {
                upsert(&mut self.mount, lead, mount);
            }
        }

        Ok(())
    }

    fn validate_mount(
        &self,
        lead: &str,
        indices: &[usize],
    ) -> Result<Mount, MountError> {
        let mount = match *indices {
            [i] => Mount::Unipolar(i),
            [i, j] => Mount::Bipolar(i, j),
            _ => {
                return Err(MountError::InvalidArity {
                    lead: lead.to_string(),
                    count: indices.len(),
                })
            }
        };

        for &index in indices {
            if index >= self.content.len() {
                return Err(MountError::IndexOutOfBounds {
                    lead: lead.to_string(),
                    index,
                    max: self.content.len().saturating_sub(1),
                });
            }
        }

        Ok(mount)
    }
}

fn upsert<V>(
    entries: &mut Vec<(String, V)>,
    key: String,
    value: V,
) {
    match entries.iter_mut().find(|(k, _)| *k == key) {
        Some(slot) => slot.1 = value,
        None => entries.push((key, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ch(
        name: &str,
        reference: usize,
    ) -> Channel {
        Channel {
            name: name.to_string(),
            reference,
            source: InputSource::Jbox,
            pin: None,
        }
    }

    /// I (униполярный, колонка 5) + CS 1-2 (биполярный, колонки 3 и 7)
    fn sample_channels() -> Channels {
        let mut channels = Channels::new();

        channels.add_unipolar("I".into(), ch("I", 5));
        channels.add_bipolar("CS 1-2".into(), ch("u+CS 1-2", 3), ch("u-CS 1-2", 7));
        channels
    }

    #[test]
    fn test_mount_indices_are_sequential() {
        let channels = sample_channels();

        assert_eq!(channels.len(), 3);
        assert_eq!(channels.get_mount("I"), Some(Mount::Unipolar(0)));
        assert_eq!(channels.get_mount("CS 1-2"), Some(Mount::Bipolar(1, 2)));
    }

    #[test]
    fn test_raw_mappings() {
        let raw = sample_channels().raw_mappings();

        assert_eq!(raw.names(), vec!["I", "u+CS 1-2", "u-CS 1-2"]);
        assert_eq!(raw.get("u-CS 1-2"), Some(ColumnSelection::Single(7)));
    }

    #[test]
    fn test_computed_mappings_inverted_order() {
        let computed = sample_channels().computed_mappings();

        assert_eq!(computed.get("I"), Some(ColumnSelection::Single(5)));
        // второй хранимый канал идёт первым
        assert_eq!(computed.get("CS 1-2"), Some(ColumnSelection::Pair(7, 3)));
    }

    #[test]
    fn test_custom_mount_merge() {
        let mut channels = sample_channels();
        let mut custom = CustomMount::new();

        custom.insert("CS 1-2", vec![2]);
        custom.insert("X", vec![0, 1]);
        channels.add_custom_mount(&custom, false).unwrap();

        let leads: Vec<_> = channels.mount().map(|(k, _)| k.to_string()).collect();

        assert_eq!(leads, vec!["I", "CS 1-2", "X"]);
        assert_eq!(channels.get_mount("CS 1-2"), Some(Mount::Unipolar(2)));
        assert_eq!(channels.get_mount("X"), Some(Mount::Bipolar(0, 1)));
    }

    #[test]
    fn test_custom_mount_override() {
        let mut channels = sample_channels();
        let mut custom = CustomMount::new();

        custom.insert("only", vec![1, 2]);
        channels.add_custom_mount(&custom, true).unwrap();

        assert_eq!(channels.mount().count(), 1);
        assert_eq!(channels.get_mount("I"), None);
    }

    #[test]
    fn test_custom_mount_out_of_bounds_rejected() {
        let mut channels = sample_channels();
        let before = channels.clone();
        let mut custom = CustomMount::new();

        custom.insert("ok", vec![0]);
        custom.insert("bad", vec![0, 3]);

        let err = channels.add_custom_mount(&custom, false).unwrap_err();

        assert_eq!(
            err,
            MountError::IndexOutOfBounds {
                lead: "bad".into(),
                index: 3,
                max: 2
            }
        );
        assert_eq!(channels, before, "таблица не должна меняться при ошибке");
    }

    #[test]
    fn test_custom_mount_arity() {
        let mut channels = sample_channels();
        let mut custom = CustomMount::new();

        custom.insert("three", vec![0, 1, 2]);

        assert!(matches!(
            channels.add_custom_mount(&custom, false),
            Err(MountError::InvalidArity { count: 3, .. })
        ));

        let mut empty_lead = CustomMount::new();
        empty_lead.insert("none", vec![]);

        assert!(channels.add_custom_mount(&empty_lead, true).is_err());
    }

    #[test]
    fn test_input_source_table() {
        assert_eq!(InputSource::from_u8(0), InputSource::Pres);
        assert_eq!(InputSource::from_u8(3), InputSource::Pres);
        assert_eq!(InputSource::from_u8(5).as_str(), "SYNC");
        assert_eq!(InputSource::from_u8(42), InputSource::Unknown(42));
    }
}
